//! Common error type for Root Things services

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommonError {
    pub fn http_status_code(&self) -> u16 {
        match self {
            CommonError::ValidationFailed(_) => 400,
            CommonError::AuthenticationFailed(_) => 401,
            CommonError::AuthorizationFailed(_) => 403,
            CommonError::NotFound(_) => 404,
            CommonError::AlreadyExists(_) => 409,
            CommonError::PayloadTooLarge(_) => 413,
            CommonError::ExternalService(_) => 502,
            _ => 500,
        }
    }

    /// Message safe to hand back to the client. Server-side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            CommonError::ValidationFailed(msg)
            | CommonError::AuthenticationFailed(msg)
            | CommonError::AuthorizationFailed(msg)
            | CommonError::NotFound(msg)
            | CommonError::AlreadyExists(msg)
            | CommonError::PayloadTooLarge(msg) => msg.clone(),
            CommonError::ExternalService(_) => "Upstream service error".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for CommonError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CommonError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                CommonError::AlreadyExists("Resource already exists".to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                CommonError::NotFound("Referenced resource not found".to_string())
            }
            _ => CommonError::Database(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        CommonError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_codes() {
        assert_eq!(CommonError::NotFound("test".to_string()).http_status_code(), 404);
        assert_eq!(CommonError::AuthenticationFailed("test".to_string()).http_status_code(), 401);
        assert_eq!(CommonError::ValidationFailed("test".to_string()).http_status_code(), 400);
        assert_eq!(CommonError::PayloadTooLarge("test".to_string()).http_status_code(), 413);
        assert_eq!(CommonError::Storage("test".to_string()).http_status_code(), 500);
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = CommonError::Database("connection refused at 10.0.0.3".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = CommonError::ValidationFailed("Missing required fields".to_string());
        assert_eq!(err.public_message(), "Missing required fields");
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: CommonError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.http_status_code(), 404);
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = CommonError::AlreadyExists("Email already registered".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Email already registered");
        assert_eq!(body["status"], 409);
    }
}
