use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = shared::database::health_check(&state.db_pool).await;

    Json(json!({
        "status": if database { "healthy" } else { "degraded" },
        "service": "user-service",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "githubLogin": state.github.is_some(),
    }))
}
