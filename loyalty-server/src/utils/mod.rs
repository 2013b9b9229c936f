//! Utility module
//!
//! - [`AppError`] - application error type (from shared::error)
//! - [`ApiResponse`] - API response envelope (from shared::error)
//! - logging, business-time and input validation helpers

pub mod error;
pub mod logger;
pub mod time;
pub mod validation;

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
