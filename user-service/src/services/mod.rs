pub mod github;
pub mod session_store;
pub mod user_service;
