use axum::{extract::State, Json};
use shared::CommonResult;
use std::sync::Arc;

use crate::db::repository;
use crate::models::{CategoryListResponse, CategorySummary};
use crate::AppState;

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> CommonResult<Json<CategoryListResponse>> {
    let categories = repository::list_categories(&state.db_pool)
        .await?
        .into_iter()
        .map(CategorySummary::from)
        .collect();

    Ok(Json(CategoryListResponse { categories }))
}
