pub mod categories;
pub mod health;
pub mod topics;

use shared::CommonError;
use uuid::Uuid;

pub fn parse_topic_id(raw: &str) -> Result<Uuid, CommonError> {
    Uuid::parse_str(raw).map_err(|_| CommonError::ValidationFailed("Invalid topic ID".to_string()))
}

pub fn topic_not_found() -> CommonError {
    CommonError::NotFound("Topic not found".to_string())
}
