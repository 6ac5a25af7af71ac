use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::{PageParams, Pagination};
use shared::{CommonError, CommonResult};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{parse_file_id, parse_review_id};
use crate::db::repository;
use crate::models::{
    ReactionRequest, ReactionResponse, ReviewListResponse, ReviewRequest, ReviewResponse, ReviewRow,
    REVIEWS_PAGE_SIZE,
};
use crate::AppState;

fn file_not_found() -> CommonError {
    CommonError::NotFound("File not found".to_string())
}

fn review_not_found() -> CommonError {
    CommonError::NotFound("Review not found".to_string())
}

/// `GET /api/files/by-id/:id/reviews`
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> CommonResult<Json<ReviewListResponse>> {
    let file_id = parse_file_id(&id)?;
    let page = params.resolve(REVIEWS_PAGE_SIZE);

    if !repository::file_exists(&state.db_pool, file_id).await? {
        return Err(file_not_found());
    }

    let (rows, total) = repository::list_reviews(&state.db_pool, file_id, page).await?;
    let rating = repository::rating_summary(&state.db_pool, file_id).await?;

    Ok(Json(ReviewListResponse {
        success: true,
        rating,
        reviews: rows.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, total.max(0) as u64),
    }))
}

/// Write the caller's review of a file. Reviewing again replaces the earlier review.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> CommonResult<(StatusCode, Json<ReviewResponse>)> {
    let file_id = parse_file_id(&id)?;
    let req = req.trimmed();
    req.validate()
        .map_err(|e| CommonError::ValidationFailed(e.to_string()))?;
    let user_id = claims.user_id()?;

    if !repository::file_exists(&state.db_pool, file_id).await? {
        return Err(file_not_found());
    }

    let (review_id, created) =
        repository::upsert_review(&state.db_pool, file_id, user_id, req.rating, &req.comment)
            .await?;
    let review = repository::get_review(&state.db_pool, review_id)
        .await?
        .ok_or_else(review_not_found)?;

    tracing::info!(%file_id, %user_id, rating = req.rating, created, "Review saved");

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ReviewResponse {
            success: true,
            review: review.into(),
        }),
    ))
}

/// Load a review and check it belongs to the file in the path
async fn review_of_file(state: &AppState, file_id: &str, review_id: &str) -> CommonResult<ReviewRow> {
    let file_id = parse_file_id(file_id)?;
    let review_id = parse_review_id(review_id)?;

    repository::get_review(&state.db_pool, review_id)
        .await?
        .filter(|review| review.file_id == file_id)
        .ok_or_else(review_not_found)
}

fn ensure_not_own_review(review: &ReviewRow, user_id: Uuid) -> CommonResult<()> {
    if review.user_id == user_id {
        return Err(CommonError::ValidationFailed(
            "You cannot react to your own review".to_string(),
        ));
    }
    Ok(())
}

/// `POST /api/files/by-id/:id/reviews/:review_id/reaction` - `{isLike}`
pub async fn react_to_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((id, review_id)): Path<(String, String)>,
    Json(req): Json<ReactionRequest>,
) -> CommonResult<Json<ReactionResponse>> {
    let user_id = claims.user_id()?;
    let review = review_of_file(&state, &id, &review_id).await?;
    ensure_not_own_review(&review, user_id)?;

    repository::set_reaction(&state.db_pool, review.id, user_id, req.is_like).await?;
    let counts = repository::reaction_counts(&state.db_pool, review.id).await?;

    Ok(Json(ReactionResponse {
        success: true,
        counts,
    }))
}

pub async fn remove_reaction(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((id, review_id)): Path<(String, String)>,
) -> CommonResult<Json<ReactionResponse>> {
    let user_id = claims.user_id()?;
    let review = review_of_file(&state, &id, &review_id).await?;

    repository::clear_reaction(&state.db_pool, review.id, user_id).await?;
    let counts = repository::reaction_counts(&state.db_pool, review.id).await?;

    Ok(Json(ReactionResponse {
        success: true,
        counts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review_by(user_id: Uuid) -> ReviewRow {
        let now = Utc::now();
        ReviewRow {
            id: Uuid::new_v4(),
            file_id: Uuid::new_v4(),
            user_id,
            user_name: "Alex Thompson".to_string(),
            user_image: None,
            rating: 5,
            comment: "Improved my device's performance".to_string(),
            likes: 0,
            dislikes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cannot_react_to_own_review() {
        let author = Uuid::new_v4();
        let review = review_by(author);

        let err = ensure_not_own_review(&review, author).unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        assert!(ensure_not_own_review(&review, Uuid::new_v4()).is_ok());
    }
}
