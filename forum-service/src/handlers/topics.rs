use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use shared::auth::Claims;
use shared::types::Pagination;
use shared::{CommonError, CommonResult};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{parse_topic_id, topic_not_found};
use crate::db::repository;
use crate::models::{
    CreateTopicRequest, CreatedTopicResponse, PinRequest, PostView, ReplyRequest, ReplyResponse,
    TopicDetail, TopicDetailResponse, TopicFilter, TopicListResponse, TopicQuery, TopicSummary,
};
use crate::AppState;

fn validation_error(err: validator::ValidationErrors) -> CommonError {
    CommonError::ValidationFailed(err.to_string())
}

/// `GET /api/forum/topics`
pub async fn list_topics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopicQuery>,
) -> CommonResult<Json<TopicListResponse>> {
    let filter = TopicFilter::from(query);
    tracing::debug!(?filter, "Listing topics");

    let (rows, total) = repository::list_topics(&state.db_pool, &filter).await?;

    let now = Utc::now();
    let topics = rows
        .into_iter()
        .map(|row| TopicSummary::from_row(row, now))
        .collect();

    Ok(Json(TopicListResponse {
        topics,
        pagination: Pagination::new(filter.page, total.max(0) as u64),
    }))
}

pub async fn create_topic(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTopicRequest>,
) -> CommonResult<(StatusCode, Json<CreatedTopicResponse>)> {
    let req = req.trimmed();
    req.validate().map_err(validation_error)?;
    let author_id = claims.user_id()?;

    let category = req.category.as_str();
    if !repository::category_exists(&state.db_pool, category).await? {
        return Err(CommonError::ValidationFailed(format!(
            "Unknown category '{}'",
            category
        )));
    }

    let id = repository::create_topic(
        &state.db_pool,
        author_id,
        category,
        &req.title,
        &req.body,
    )
    .await?;

    tracing::info!(topic_id = %id, %author_id, category, "Topic created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedTopicResponse { success: true, id }),
    ))
}

/// Topic with its replies. Every fetch counts as a view.
pub async fn get_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CommonResult<Json<TopicDetailResponse>> {
    let topic_id = parse_topic_id(&id)?;

    if !repository::increment_views(&state.db_pool, topic_id).await? {
        return Err(topic_not_found());
    }

    let row = repository::get_topic(&state.db_pool, topic_id)
        .await?
        .ok_or_else(topic_not_found)?;
    let posts = repository::list_posts(&state.db_pool, topic_id).await?;

    Ok(Json(TopicDetailResponse {
        topic: TopicDetail {
            summary: TopicSummary::from_row(row.topic, Utc::now()),
            body: row.body,
            posts: posts.into_iter().map(PostView::from).collect(),
        },
    }))
}

pub async fn create_reply(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> CommonResult<(StatusCode, Json<ReplyResponse>)> {
    let topic_id = parse_topic_id(&id)?;
    let req = req.trimmed();
    req.validate().map_err(validation_error)?;

    let author_id = claims.user_id()?;
    let post = repository::create_reply(&state.db_pool, topic_id, author_id, &req.body)
        .await?
        .ok_or_else(topic_not_found)?;

    tracing::info!(%topic_id, post_id = %post.id, "Reply posted");

    Ok((
        StatusCode::CREATED,
        Json(ReplyResponse {
            success: true,
            post: post.into(),
        }),
    ))
}

/// Pin or unpin a topic (admin only)
pub async fn set_pinned(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<PinRequest>,
) -> CommonResult<Json<Value>> {
    let topic_id = parse_topic_id(&id)?;

    if !repository::set_pinned(&state.db_pool, topic_id, req.pinned).await? {
        return Err(topic_not_found());
    }

    tracing::info!(%topic_id, admin_id = %claims.sub, pinned = req.pinned, "Topic pin changed");

    Ok(Json(json!({ "success": true, "pinned": req.pinned })))
}

/// Delete a topic. Only the author or an admin may do this.
pub async fn delete_topic(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> CommonResult<Json<Value>> {
    let topic_id = parse_topic_id(&id)?;
    let user_id = claims.user_id()?;

    let author_id = repository::get_topic_author(&state.db_pool, topic_id)
        .await?
        .ok_or_else(topic_not_found)?;

    ensure_can_delete(&claims, user_id, author_id)?;

    if !repository::delete_topic(&state.db_pool, topic_id).await? {
        return Err(topic_not_found());
    }

    tracing::info!(%topic_id, %user_id, "Topic deleted");

    Ok(Json(json!({ "success": true })))
}

fn ensure_can_delete(claims: &Claims, user_id: Uuid, author_id: Uuid) -> CommonResult<()> {
    if author_id != user_id && !claims.is_admin() {
        return Err(CommonError::AuthorizationFailed(
            "Only the author can delete this topic".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::auth::TokenType;
    use shared::types::Role;

    fn claims(user_id: Uuid, role: Role) -> Claims {
        Claims {
            sub: user_id.to_string(),
            email: "poster@example.com".to_string(),
            name: "Poster".to_string(),
            role,
            token_type: TokenType::Access,
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_delete_permissions() {
        let author = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert!(ensure_can_delete(&claims(author, Role::User), author, author).is_ok());
        assert!(ensure_can_delete(&claims(stranger, Role::Admin), stranger, author).is_ok());

        let err = ensure_can_delete(&claims(stranger, Role::User), stranger, author).unwrap_err();
        assert_eq!(err.http_status_code(), 403);
    }
}
