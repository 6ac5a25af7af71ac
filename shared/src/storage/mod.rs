//! Object storage for uploaded artifacts, preview images and avatars.
//!
//! Blobs live in a Cloudflare R2 bucket. The database only stores a stable
//! public URL of the form `{PUBLIC_BASE_URL}/api/files/{encoded key}`; the
//! object key is recovered from that URL whenever a signed link is needed.

pub mod r2;

#[cfg(any(test, feature = "testkit"))]
pub mod memory;

pub use r2::R2Store;

#[cfg(any(test, feature = "testkit"))]
pub use memory::MemoryStore;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{CommonError, CommonResult};

/// Lifetime of signed download and upload links.
pub const PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

const FILES_ROUTE: &str = "/api/files/";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> CommonResult<()>;

    async fn delete_object(&self, key: &str) -> CommonResult<()>;

    async fn presign_get(&self, key: &str, expires_in: Duration) -> CommonResult<String>;

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> CommonResult<String>;
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
}

impl StorageConfig {
    pub fn from_env() -> CommonResult<Self> {
        let required = |name: &str| {
            std::env::var(name)
                .map_err(|_| CommonError::Internal(format!("{} must be set", name)))
        };

        Ok(Self {
            endpoint: required("CLOUDFLARE_R2_ENDPOINT")?,
            access_key_id: required("CLOUDFLARE_R2_ACCESS_KEY_ID")?,
            secret_access_key: required("CLOUDFLARE_R2_SECRET_ACCESS_KEY")?,
            bucket: std::env::var("CLOUDFLARE_R2_BUCKET_NAME")
                .unwrap_or_else(|_| "root-things".to_string()),
        })
    }
}

/// Build a fresh object key `{prefix}/{uuid}[.ext]` keeping the extension of
/// the uploaded file name. Names without a usable extension get none.
pub fn object_key(prefix: &str, original_name: &str) -> String {
    let id = Uuid::new_v4();
    match file_extension(original_name) {
        Some(ext) => format!("{}/{}.{}", prefix.trim_end_matches('/'), id, ext),
        None => format!("{}/{}", prefix.trim_end_matches('/'), id),
    }
}

pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

/// Stable URL stored in the database for an object.
pub fn public_file_url(base_url: &str, key: &str) -> String {
    format!(
        "{}{}{}",
        base_url.trim_end_matches('/'),
        FILES_ROUTE,
        urlencoding::encode(key)
    )
}

/// Recover the object key from a stored URL.
///
/// URLs produced by [`public_file_url`] carry the encoded key after
/// `/api/files/`. Anything else is treated as `scheme://host/{key}`.
pub fn key_from_url(url: &str) -> Option<String> {
    let encoded = match url.find(FILES_ROUTE) {
        Some(idx) => &url[idx + FILES_ROUTE.len()..],
        None => {
            let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
            let (_, path) = without_scheme.split_once('/')?;
            path
        }
    };

    let encoded = encoded.split(['?', '#']).next().unwrap_or_default();
    if encoded.is_empty() {
        return None;
    }

    urlencoding::decode(encoded).ok().map(|key| key.into_owned())
}

/// Best effort content type for a file name, used when the client sends none.
pub fn guess_content_type(name: &str) -> &'static str {
    match file_extension(name).as_deref() {
        Some("zip") => "application/zip",
        Some("sh") => "application/x-sh",
        Some("img") => "application/octet-stream",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_object_key_keeps_extension() {
        let key = object_key("files/module", "Battery-Optimizer.ZIP");
        assert!(key.starts_with("files/module/"));
        assert!(key.ends_with(".zip"));

        let stem = key.trim_start_matches("files/module/").trim_end_matches(".zip");
        assert!(Uuid::parse_str(stem).is_ok());
    }

    #[test]
    fn test_object_key_without_extension() {
        let key = object_key("images/script", "README");
        let stem = key.trim_start_matches("images/script/");
        assert!(Uuid::parse_str(stem).is_ok());

        assert_eq!(file_extension(".bashrc"), None);
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
    }

    #[test]
    fn test_public_url_round_trips_to_key() {
        let url = public_file_url("http://localhost:3000/", "files/module/abc.zip");
        assert_eq!(url, "http://localhost:3000/api/files/files%2Fmodule%2Fabc.zip");
        assert_eq!(key_from_url(&url).as_deref(), Some("files/module/abc.zip"));
    }

    #[test]
    fn test_key_from_foreign_url() {
        assert_eq!(
            key_from_url("https://cdn.example.com/files/kernel/x.img?sig=1").as_deref(),
            Some("files/kernel/x.img")
        );
        assert_eq!(key_from_url("https://cdn.example.com/"), None);
        assert_eq!(key_from_url("http://localhost:3000/api/files/"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a.zip"), "application/zip");
        assert_eq!(guess_content_type("shot.JPG"), "image/jpeg");
        assert_eq!(guess_content_type("unknown"), "application/octet-stream");
    }
}
