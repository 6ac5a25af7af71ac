//! Shared utilities and types for Root Things backend services

// Re-export common dependencies
pub use anyhow;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
pub use uuid;

pub mod auth;
pub mod database;
pub mod error;
pub mod observability;
pub mod shutdown;
pub mod storage;
pub mod types;
pub mod upload;

pub use error::{CommonError, CommonResult};
