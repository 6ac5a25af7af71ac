use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, error, info};

use super::{ObjectStore, StorageConfig};
use crate::error::{CommonError, CommonResult};

/// S3 compatible client pointed at a Cloudflare R2 bucket.
#[derive(Clone)]
pub struct R2Store {
    client: Client,
    bucket: String,
}

impl R2Store {
    pub fn new(config: &StorageConfig) -> Self {
        info!("Initializing R2 client for bucket: {}", config.bucket);

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "r2",
        );

        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    fn presigning(expires_in: Duration) -> CommonResult<PresigningConfig> {
        PresigningConfig::expires_in(expires_in)
            .map_err(|e| CommonError::Storage(format!("Invalid presign expiry: {}", e)))
    }
}

#[async_trait]
impl ObjectStore for R2Store {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> CommonResult<()> {
        debug!("Uploading object: {} ({} bytes)", key, body.len());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                error!("R2 upload failed for {}: {}", key, DisplayErrorContext(&e));
                CommonError::Storage(format!("Failed to upload {}", key))
            })?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> CommonResult<()> {
        debug!("Deleting object: {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!("R2 delete failed for {}: {}", key, DisplayErrorContext(&e));
                CommonError::Storage(format!("Failed to delete {}", key))
            })?;

        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> CommonResult<String> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(|e| {
                error!("Failed to sign download for {}: {}", key, DisplayErrorContext(&e));
                CommonError::Storage(format!("Failed to sign download for {}", key))
            })?;

        Ok(request.uri().to_string())
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> CommonResult<String> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(|e| {
                error!("Failed to sign upload for {}: {}", key, DisplayErrorContext(&e));
                CommonError::Storage(format!("Failed to sign upload for {}", key))
            })?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> StorageConfig {
        StorageConfig {
            endpoint: "https://account.r2.cloudflarestorage.com".to_string(),
            access_key_id: "test-access-key".to_string(),
            secret_access_key: "test-secret-key".to_string(),
            bucket: "root-things".to_string(),
        }
    }

    #[tokio::test]
    async fn test_presigned_download_is_signed_locally() {
        let store = R2Store::new(&test_config());
        let url = store
            .presign_get("files/module/abc.zip", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with("https://account.r2.cloudflarestorage.com/root-things/files/module/abc.zip"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_presigned_upload_targets_key() {
        let store = R2Store::new(&test_config());
        let url = store
            .presign_put("files/kernel/k.img", "application/octet-stream", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(url.contains("/root-things/files/kernel/k.img"));
        assert!(url.contains("X-Amz-Expires=600"));
    }

    #[tokio::test]
    async fn test_presign_rejects_excessive_expiry() {
        let store = R2Store::new(&test_config());
        let result = store
            .presign_get("a", Duration::from_secs(60 * 60 * 24 * 30))
            .await;

        assert!(matches!(result, Err(CommonError::Storage(_))));
    }
}
