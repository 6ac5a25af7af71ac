use anyhow::Result;
use shared::auth::JwtConfig;
use shared::database::DatabaseConfig;
use shared::storage::StorageConfig;

const MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub github: Option<GithubConfig>,
    pub uploads: AvatarConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Lifetime of a pending GitHub login `state`
    pub oauth_state_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Option<String>,
}

impl GithubConfig {
    /// `None` unless both the client id and secret are set.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("GITHUB_ID").ok().filter(|v| !v.is_empty())?;
        let client_secret = std::env::var("GITHUB_SECRET").ok().filter(|v| !v.is_empty())?;

        Some(Self {
            client_id,
            client_secret,
            redirect_url: std::env::var("GITHUB_REDIRECT_URL").ok(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub public_base_url: String,
    pub max_image_size: usize,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
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
                    .unwrap_or_else(|_| "8082".to_string())
                    .parse()?,
            },
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                oauth_state_ttl_seconds: 600,
            },
            jwt: JwtConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            github: GithubConfig::from_env(),
            uploads: AvatarConfig {
                public_base_url: std::env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                max_image_size: std::env::var("MAX_IMAGE_SIZE_MB")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse::<usize>()?
                    * MB,
            },
        })
    }
}
