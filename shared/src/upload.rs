//! Multipart helpers for upload endpoints

use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use mime::Mime;

use crate::error::CommonError;

pub const MB: usize = 1024 * 1024;

pub fn multipart_error(err: MultipartError) -> CommonError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        CommonError::PayloadTooLarge("Upload exceeds the maximum request size".to_string())
    } else {
        CommonError::ValidationFailed(format!("Invalid multipart: {}", err.body_text()))
    }
}

/// Read a multipart field, stopping as soon as it grows past `limit` bytes.
pub async fn read_field_limited(
    mut field: Field<'_>,
    limit: usize,
    label: &str,
) -> Result<Bytes, CommonError> {
    let mut buffer = BytesMut::new();

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > limit {
            return Err(too_large(label, limit));
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

fn too_large(label: &str, limit: usize) -> CommonError {
    if limit >= MB {
        CommonError::PayloadTooLarge(format!(
            "{} too large. Maximum size is {} MB",
            label,
            limit / MB
        ))
    } else {
        CommonError::PayloadTooLarge(format!(
            "{} too large. Maximum size is {} bytes",
            label, limit
        ))
    }
}

/// Extension for a supported image content type (JPEG, PNG, WebP, GIF).
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let parsed: Mime = content_type.parse().ok()?;
    if parsed.type_() != mime::IMAGE {
        return None;
    }

    match parsed.subtype().as_str() {
        "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        _ => None,
    }
}

pub fn is_supported_image(content_type: &str) -> bool {
    image_extension(content_type).is_some()
}
