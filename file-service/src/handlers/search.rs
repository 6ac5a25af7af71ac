use axum::{
    extract::{Query, State},
    Json,
};
use shared::types::{FileSummary, Pagination};
use shared::CommonResult;
use std::sync::Arc;

use crate::db::repository;
use crate::models::{SearchFilter, SearchParams, SearchResponse};
use crate::AppState;

/// Full-text search over files with type/category filters, sorting and paging
pub async fn search_files(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> CommonResult<Json<SearchResponse>> {
    let filter = SearchFilter::from(params);
    tracing::debug!(?filter, "Searching files");

    let (rows, total) = repository::search_files(&state.db_pool, &filter).await?;

    let files = rows
        .into_iter()
        .map(FileSummary::try_from)
        .collect::<CommonResult<Vec<_>>>()?;

    Ok(Json(SearchResponse {
        success: true,
        files,
        pagination: Pagination::new(filter.page, total.max(0) as u64).into(),
    }))
}
