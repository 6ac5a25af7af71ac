use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use shared::{CommonError, CommonResult};
use std::sync::Arc;

use crate::auth::generate_oauth_state;
use crate::models::{AuthResponse, GithubCallbackQuery};
use crate::services::github::GithubClient;
use crate::AppState;

fn github_client(state: &AppState) -> CommonResult<&GithubClient> {
    state
        .github
        .as_ref()
        .ok_or_else(|| CommonError::NotFound("GitHub login is not configured".to_string()))
}

/// `GET /api/auth/github` - send the browser to GitHub with a fresh state
pub async fn github_login(State(state): State<Arc<AppState>>) -> CommonResult<Redirect> {
    let client = github_client(&state)?;

    let oauth_state = generate_oauth_state();
    state
        .sessions
        .store_oauth_state(&oauth_state, state.config.redis.oauth_state_ttl_seconds)
        .await?;

    let url = client.authorize_url(&oauth_state)?;
    Ok(Redirect::temporary(&url))
}

pub async fn github_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GithubCallbackQuery>,
) -> CommonResult<Json<AuthResponse>> {
    let client = github_client(&state)?;

    if let Some(error) = query.error {
        return Err(CommonError::AuthenticationFailed(format!(
            "GitHub login failed: {}",
            error
        )));
    }

    let (code, oauth_state) = match (query.code, query.state) {
        (Some(code), Some(oauth_state)) => (code, oauth_state),
        _ => {
            return Err(CommonError::ValidationFailed(
                "Missing code or state".to_string(),
            ))
        }
    };

    if !state.sessions.take_oauth_state(&oauth_state).await? {
        return Err(CommonError::AuthenticationFailed(
            "Invalid or expired OAuth state".to_string(),
        ));
    }

    let identity = client.fetch_identity(&code).await.map_err(|e| {
        tracing::warn!("GitHub exchange failed: {}", e);
        CommonError::from(e)
    })?;

    let response = state.user_service.login_with_github(identity).await?;
    Ok(Json(response))
}
