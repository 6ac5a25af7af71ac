//! Session tokens shared by every service.
//!
//! The user service issues tokens, the file and forum services only verify
//! them, so both halves live here next to the request middleware.

pub mod middleware;

pub use middleware::{admin_middleware, auth_middleware, optional_auth_middleware, AuthError};

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CommonError, CommonResult};
use crate::types::{Role, User};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_hours: u64,
    pub refresh_token_expiry_days: u64,
}

impl JwtConfig {
    pub fn from_env() -> CommonResult<Self> {
        Ok(Self {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| CommonError::Internal("JWT_SECRET must be set".to_string()))?,
            access_token_expiry_hours: std::env::var("ACCESS_TOKEN_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            refresh_token_expiry_days: std::env::var("REFRESH_TOKEN_EXPIRY_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub email: String,
    pub name: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> CommonResult<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| CommonError::AuthenticationFailed("Invalid session".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

pub struct TokenService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Seconds an access token stays valid.
    pub fn access_token_ttl(&self) -> u64 {
        self.config.access_token_expiry_hours * 3600
    }

    pub fn refresh_token_ttl(&self) -> u64 {
        self.config.refresh_token_expiry_days * 86400
    }

    pub fn issue(&self, user: &User, token_type: TokenType) -> CommonResult<String> {
        let now = Utc::now();
        let expiry = match token_type {
            TokenType::Access => now + Duration::seconds(self.access_token_ttl() as i64),
            TokenType::Refresh => now + Duration::seconds(self.refresh_token_ttl() as i64),
        };

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            token_type,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| CommonError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn issue_pair(&self, user: &User) -> CommonResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(user, TokenType::Access)?,
            refresh_token: self.issue(user, TokenType::Refresh)?,
            expires_in: self.access_token_ttl(),
        })
    }

    /// Validate and decode a token of any type.
    pub fn validate(&self, token: &str) -> CommonResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| CommonError::AuthenticationFailed("Invalid or expired token".to_string()))
    }

    pub fn validate_as(&self, token: &str, expected: TokenType) -> CommonResult<Claims> {
        let claims = self.validate(token)?;
        if claims.token_type != expected {
            return Err(CommonError::AuthenticationFailed("Invalid token type".to_string()));
        }
        Ok(claims)
    }
}
