pub mod download;
pub mod files;
pub mod health;
pub mod reviews;
pub mod search;
pub mod upload;

use shared::CommonError;
use uuid::Uuid;

/// Parse a path id, rejecting malformed values with a 400.
pub fn parse_file_id(raw: &str) -> Result<Uuid, CommonError> {
    Uuid::parse_str(raw).map_err(|_| CommonError::ValidationFailed("Invalid file ID".to_string()))
}

pub fn parse_review_id(raw: &str) -> Result<Uuid, CommonError> {
    Uuid::parse_str(raw)
        .map_err(|_| CommonError::ValidationFailed("Invalid review ID".to_string()))
}
