use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::{json, Value};
use shared::auth::Claims;
use shared::types::{PageParams, Pagination, Role, UserPublic};
use shared::{CommonError, CommonResult};
use std::sync::Arc;

use super::parse_id;
use crate::models::{AdminUserQuery, RoleUpdateRequest, UserListResponse};
use crate::AppState;

const USERS_PAGE_SIZE: u32 = 20;

/// List all users (admin only)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminUserQuery>,
) -> CommonResult<Json<UserListResponse>> {
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(USERS_PAGE_SIZE);

    let (users, total) = state
        .user_service
        .list_users(query.search.as_deref(), page)
        .await?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserPublic::from).collect(),
        pagination: Pagination::new(page, total),
    }))
}

/// Change a user's role (admin only). Admins cannot change their own role.
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<RoleUpdateRequest>,
) -> CommonResult<Json<Value>> {
    let user_id = parse_id(&id, "user")?;
    let role: Role = req.role.parse()?;

    if user_id == claims.user_id()? {
        return Err(CommonError::ValidationFailed(
            "You cannot change your own role".to_string(),
        ));
    }

    let user = state.user_service.set_role(user_id, role).await?;
    tracing::info!(admin_id = %claims.sub, %user_id, "Role changed to {}", role.as_str());

    Ok(Json(json!({ "success": true, "user": UserPublic::from(user) })))
}
