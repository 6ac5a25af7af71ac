use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::{FileSummary, PageParams, Pagination, DEFAULT_PAGE_SIZE};
use shared::CommonResult;
use std::sync::Arc;

use super::parse_id;
use crate::models::{FavoriteResponse, FileList, FileListResponse};
use crate::AppState;

async fn list(
    state: &AppState,
    claims: &Claims,
    list: FileList,
    params: &PageParams,
) -> CommonResult<Json<FileListResponse>> {
    let page = params.resolve(DEFAULT_PAGE_SIZE);

    let (rows, total) = state
        .user_service
        .list_files(claims.user_id()?, list, page)
        .await?;

    let files = rows
        .into_iter()
        .map(FileSummary::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(FileListResponse {
        success: true,
        files,
        pagination: Pagination::new(page, total),
    }))
}

pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PageParams>,
) -> CommonResult<Json<FileListResponse>> {
    list(&state, &claims, FileList::Uploads, &params).await
}

pub async fn list_downloads(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PageParams>,
) -> CommonResult<Json<FileListResponse>> {
    list(&state, &claims, FileList::Downloads, &params).await
}

pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PageParams>,
) -> CommonResult<Json<FileListResponse>> {
    list(&state, &claims, FileList::Favorites, &params).await
}

pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> CommonResult<Json<FavoriteResponse>> {
    let file_id = parse_id(&file_id, "file")?;

    state
        .user_service
        .add_favorite(claims.user_id()?, file_id)
        .await?;

    Ok(Json(FavoriteResponse {
        success: true,
        favorited: true,
    }))
}

pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> CommonResult<Json<FavoriteResponse>> {
    let file_id = parse_id(&file_id, "file")?;

    state
        .user_service
        .remove_favorite(claims.user_id()?, file_id)
        .await?;

    Ok(Json(FavoriteResponse {
        success: true,
        favorited: false,
    }))
}
