use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use shared::auth::Claims;
use shared::CommonResult;
use std::sync::Arc;
use validator::Validate;

use crate::models::{
    validation_error, AuthResponse, LoginRequest, RefreshTokenRequest, RegisterRequest,
    SessionResponse, SessionUser,
};
use crate::AppState;

/// Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> CommonResult<(StatusCode, Json<AuthResponse>)> {
    req.validate().map_err(validation_error)?;

    let response = state.user_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with email and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> CommonResult<Json<AuthResponse>> {
    req.validate().map_err(validation_error)?;

    let response = state.user_service.login(req).await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> CommonResult<Json<AuthResponse>> {
    let response = state.user_service.refresh(&req.refresh_token).await?;
    Ok(Json(response))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> CommonResult<Json<Value>> {
    state.user_service.logout(claims.user_id()?).await?;

    Ok(Json(json!({ "success": true })))
}

/// Current session: the signed-in user and when the access token runs out
pub async fn session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> CommonResult<Json<SessionResponse>> {
    let user = state.user_service.get_user(claims.user_id()?).await?;

    Ok(Json(SessionResponse {
        user: SessionUser::from(user),
        expires: DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
    }))
}
