use anyhow::Result;
use shared::auth::JwtConfig;
use shared::database::DatabaseConfig;
use shared::storage::StorageConfig;

const MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Base of the stable URLs stored for uploaded blobs
    pub public_base_url: String,
    pub max_file_size: usize,
    pub max_image_size: usize,
}

impl UploadConfig {
    /// Upper bound for a whole multipart upload request.
    pub fn max_request_size(&self) -> usize {
        self.max_file_size + self.max_image_size + MB
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            max_file_size: 50 * MB,
            max_image_size: 5 * MB,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8081".to_string())
                    .parse()?,
            },
            database: DatabaseConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            uploads: UploadConfig {
                public_base_url: std::env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                max_file_size: std::env::var("MAX_FILE_SIZE_MB")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse::<usize>()?
                    * MB,
                max_image_size: std::env::var("MAX_IMAGE_SIZE_MB")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse::<usize>()?
                    * MB,
            },
        })
    }
}
