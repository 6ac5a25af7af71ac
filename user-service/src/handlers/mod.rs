pub mod admin;
pub mod auth;
pub mod contact;
pub mod favorites;
pub mod github;
pub mod health;
pub mod profile;

use shared::CommonError;
use uuid::Uuid;

/// Parse a path id, rejecting malformed values with a 400.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, CommonError> {
    Uuid::parse_str(raw).map_err(|_| CommonError::ValidationFailed(format!("Invalid {} ID", what)))
}
