//! Shared types for the loyalty service
//!
//! Types used by both the server and its clients: data models, the unified
//! error system, phone normalization and small utilities.

pub mod error;
pub mod models;
pub mod phone;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
