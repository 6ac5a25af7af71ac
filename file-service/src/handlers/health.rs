use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let database = shared::database::health_check(&state.db_pool).await;

    (
        StatusCode::OK,
        Json(json!({
            "status": if database { "healthy" } else { "degraded" },
            "service": "file-service",
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
        })),
    )
}
