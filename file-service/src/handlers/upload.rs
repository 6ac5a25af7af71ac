use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::FileType;
use shared::storage::{guess_content_type, object_key, public_file_url, PRESIGN_EXPIRY};
use shared::upload::{is_supported_image, multipart_error, read_field_limited};
use shared::{CommonError, CommonResult};
use std::sync::Arc;
use validator::Validate;

use crate::db::repository;
use crate::models::{
    NewFile, UploadForm, UploadFormBuilder, UploadResponse, UploadUrlRequest, UploadUrlResponse,
    UploadedFileRef, UploadedPart,
};
use crate::AppState;

/// Handle a multipart file upload
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> CommonResult<Json<UploadResponse>> {
    let author_id = claims.user_id()?;
    tracing::info!(user_id = %author_id, "Received file upload request");

    let form = collect_form(&state, multipart).await?.build()?;

    tracing::info!(
        "File received: name={}, type={}, size={} bytes",
        form.name,
        form.file_type,
        form.file.data.len()
    );

    let stored = store_blobs(&state, &form).await?;

    let new_file = NewFile {
        name: form.name,
        description: form.description,
        file_type: form.file_type,
        category: form.category,
        tags: form.tags,
        url: stored.file_url.clone(),
        size: form.file.data.len() as i64,
        author_id,
        image: stored.image_url.clone(),
        version: form.version,
        compatibility: form.compatibility,
    };

    let file = match repository::create_file(&state.db_pool, new_file).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("Failed to create file record: {}", e);

            // Rollback: remove the blobs we just stored
            discard(&state, &stored).await;

            return Err(e.into());
        }
    };

    Ok(Json(UploadResponse {
        success: true,
        file: UploadedFileRef {
            id: file.id,
            name: file.name,
            url: file.url,
        },
    }))
}

async fn collect_form(state: &AppState, mut multipart: Multipart) -> CommonResult<UploadFormBuilder> {
    let limits = &state.config.uploads;
    let mut builder = UploadFormBuilder::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();
        tracing::debug!("Processing field: {}", field_name);

        match field_name.as_str() {
            "file" | "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| guess_content_type(&file_name).to_string());

                let (limit, label) = if field_name == "file" {
                    (limits.max_file_size, "File")
                } else {
                    (limits.max_image_size, "Image")
                };

                let data = read_field_limited(field, limit, label).await?;
                let part = UploadedPart {
                    file_name,
                    content_type,
                    data,
                };

                if field_name == "file" {
                    builder.file = Some(part);
                } else {
                    builder.image = Some(part);
                }
            }
            _ => {
                let value = field.text().await.map_err(multipart_error)?;
                builder.fields.insert(field_name, value);
            }
        }
    }

    Ok(builder)
}

struct StoredBlobs {
    file_key: String,
    file_url: String,
    image_key: Option<String>,
    image_url: Option<String>,
}

impl StoredBlobs {
    fn keys(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.file_key).chain(self.image_key.iter())
    }
}

async fn store_blobs(state: &AppState, form: &UploadForm) -> CommonResult<StoredBlobs> {
    let base_url = &state.config.uploads.public_base_url;

    let file_key = object_key(&format!("files/{}", form.file_type), &form.file.file_name);
    state
        .store
        .put_object(&file_key, form.file.data.clone(), &form.file.content_type)
        .await?;

    let mut stored = StoredBlobs {
        file_url: public_file_url(base_url, &file_key),
        file_key,
        image_key: None,
        image_url: None,
    };

    if let Some(image) = &form.image {
        if !is_supported_image(&image.content_type) {
            discard(state, &stored).await;
            return Err(CommonError::ValidationFailed(
                "Preview image must be a JPEG, PNG, WebP or GIF".to_string(),
            ));
        }

        let image_key = object_key(&format!("images/{}", form.file_type), &image.file_name);
        if let Err(e) = state
            .store
            .put_object(&image_key, image.data.clone(), &image.content_type)
            .await
        {
            discard(state, &stored).await;
            return Err(e);
        }

        stored.image_url = Some(public_file_url(base_url, &image_key));
        stored.image_key = Some(image_key);
    }

    tracing::info!("Blobs stored: {:?}", stored.keys().collect::<Vec<_>>());
    Ok(stored)
}

async fn discard(state: &AppState, stored: &StoredBlobs) {
    for key in stored.keys() {
        if let Err(e) = state.store.delete_object(key).await {
            tracing::warn!("Failed to delete {}: {}", key, e);
        }
    }
}

/// Hand out a presigned PUT URL so large files can go straight to storage
pub async fn create_upload_url(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UploadUrlRequest>,
) -> CommonResult<Json<UploadUrlResponse>> {
    req.validate()
        .map_err(|e| CommonError::ValidationFailed(e.to_string()))?;
    let file_type: FileType = req.file_type.parse()?;

    let key = object_key(&format!("files/{}", file_type), &req.file_name);
    let upload_url = state
        .store
        .presign_put(&key, &req.content_type, PRESIGN_EXPIRY)
        .await?;

    tracing::info!(user_id = %claims.sub, "Issued upload URL for {}", key);

    Ok(Json(UploadUrlResponse {
        success: true,
        upload_url,
        file_url: public_file_url(&state.config.uploads.public_base_url, &key),
        key,
        expires_in: PRESIGN_EXPIRY.as_secs(),
    }))
}
