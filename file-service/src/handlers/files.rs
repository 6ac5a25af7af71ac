use axum::{
    extract::{Path, State},
    response::Redirect,
    Extension, Json,
};
use serde_json::{json, Value};
use shared::auth::Claims;
use shared::storage::{key_from_url, PRESIGN_EXPIRY};
use shared::types::FileSummary;
use shared::{CommonError, CommonResult};
use std::sync::Arc;

use super::parse_file_id;
use crate::db::repository;
use crate::models::FileDetailResponse;
use crate::AppState;

/// `GET /api/files/:key` - temporary redirect to a signed URL for the object.
/// The path extractor has already percent-decoded the key.
pub async fn redirect_to_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> CommonResult<Redirect> {
    if key.trim().is_empty() {
        return Err(CommonError::ValidationFailed("Missing file key".to_string()));
    }

    let signed_url = state.store.presign_get(&key, PRESIGN_EXPIRY).await?;
    Ok(Redirect::temporary(&signed_url))
}

/// File detail with its author and average rating
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CommonResult<Json<FileDetailResponse>> {
    let file_id = parse_file_id(&id)?;

    let row = repository::get_file_with_author(&state.db_pool, file_id)
        .await?
        .ok_or_else(|| CommonError::NotFound("File not found".to_string()))?;
    let rating = repository::rating_summary(&state.db_pool, file_id).await?;

    Ok(Json(FileDetailResponse {
        success: true,
        file: FileSummary::try_from(row)?,
        rating,
    }))
}

/// Delete a file and its blobs. Only the author or an admin may do this.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> CommonResult<Json<Value>> {
    let file_id = parse_file_id(&id)?;
    let user_id = claims.user_id()?;

    let file = repository::get_file(&state.db_pool, file_id)
        .await?
        .ok_or_else(|| CommonError::NotFound("File not found".to_string()))?;

    if file.author_id != user_id && !claims.is_admin() {
        return Err(CommonError::AuthorizationFailed(
            "Only the author can delete this file".to_string(),
        ));
    }

    if !repository::delete_file(&state.db_pool, file_id).await? {
        return Err(CommonError::NotFound("File not found".to_string()));
    }

    let keys = std::iter::once(file.url.as_str())
        .chain(file.image.as_deref())
        .filter_map(key_from_url);

    for key in keys {
        if let Err(e) = state.store.delete_object(&key).await {
            tracing::warn!(%file_id, "Failed to delete blob {}: {}", key, e);
        }
    }

    tracing::info!(%file_id, %user_id, "File deleted");

    Ok(Json(json!({ "success": true })))
}
