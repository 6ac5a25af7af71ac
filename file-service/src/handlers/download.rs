use axum::{
    extract::{Path, State},
    Extension, Json,
};
use shared::auth::Claims;
use shared::storage::{key_from_url, PRESIGN_EXPIRY};
use shared::{CommonError, CommonResult};
use std::sync::Arc;

use super::parse_file_id;
use crate::db::repository;
use crate::models::{DownloadResponse, DownloadedFile};
use crate::AppState;

/// Sign a download link for a file and count the download
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    claims: Option<Extension<Claims>>,
) -> CommonResult<Json<DownloadResponse>> {
    let file_id = parse_file_id(&id)?;

    let file = repository::get_file(&state.db_pool, file_id)
        .await?
        .ok_or_else(|| CommonError::NotFound("File not found".to_string()))?;
    let file_type = file.file_type()?;

    let key = key_from_url(&file.url)
        .ok_or_else(|| CommonError::Internal(format!("Cannot derive object key from {}", file.url)))?;

    let download_url = state.store.presign_get(&key, PRESIGN_EXPIRY).await?;

    let download_count = repository::increment_download_count(&state.db_pool, file_id).await?;

    if let Some(Extension(claims)) = claims {
        let user_id = claims.user_id()?;
        // The link is already signed; a failed history write only gets logged
        if let Err(e) = repository::record_download(&state.db_pool, user_id, file_id).await {
            tracing::warn!(%user_id, %file_id, "Failed to record download: {}", e);
        }
    }

    tracing::info!(%file_id, download_count, "Download link issued");

    Ok(Json(DownloadResponse {
        success: true,
        download_url,
        file: DownloadedFile {
            id: file.id,
            name: file.name,
            description: file.description,
            file_type,
            download_count,
            version: file.version,
        },
    }))
}
