use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use shared::CommonResult;
use std::sync::Arc;
use validator::Validate;

use crate::models::{validation_error, ContactRequest};
use crate::AppState;

pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContactRequest>,
) -> CommonResult<(StatusCode, Json<Value>)> {
    req.validate().map_err(validation_error)?;

    let id = state.user_service.save_contact_message(req).await?;
    tracing::info!(message_id = %id, "Contact message received");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Message sent successfully" })),
    ))
}
