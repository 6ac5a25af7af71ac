use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::{Claims, TokenService, TokenType};

/// Extract user claims from the Authorization header
pub async fn auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = access_claims(&tokens, request.headers())?;

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Same as [`auth_middleware`] but the caller must be an admin
pub async fn admin_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = access_claims(&tokens, request.headers())?;

    if !claims.is_admin() {
        return Err(AuthError::InsufficientPermissions);
    }

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Optionally extract user claims (doesn't fail if no token provided)
pub async fn optional_auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(claims) = access_claims(&tokens, request.headers()) {
        request.extensions_mut().insert(claims);
    }

    next.run(request).await
}

fn access_claims(tokens: &TokenService, headers: &HeaderMap) -> Result<Claims, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    // "Bearer {token}"
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    let claims = tokens.validate(token).map_err(|_| AuthError::InvalidToken)?;

    if claims.token_type != TokenType::Access {
        return Err(AuthError::InvalidTokenType);
    }

    Ok(claims)
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    InvalidTokenType,
    InsufficientPermissions,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AuthError::InvalidFormat => (StatusCode::UNAUTHORIZED, "Invalid authorization format"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::InvalidTokenType => (StatusCode::UNAUTHORIZED, "Invalid token type"),
            AuthError::InsufficientPermissions => (StatusCode::FORBIDDEN, "Insufficient permissions"),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
