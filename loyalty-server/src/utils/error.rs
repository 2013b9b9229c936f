//! Unified error handling
//!
//! Every failure reaching a client is an [`AppError`] from `shared::error`.
//! This module adds the conversion from data-layer errors.
//!
//! | Range | Category | Example |
//! |-------|----------|---------|
//! | 0xxx | General | 3 NotFound |
//! | 1xxx | Auth | 1001 NotAuthenticated |
//! | 2xxx | Permission | 2001 PermissionDenied |
//! | 4xxx | Loyalty | 4002 PhoneAlreadyExists |
//! | 9xxx | System | 9404 SystemBusy |

use crate::db::repository::RepoError;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::not_found(msg),
            RepoError::Duplicate {
                message,
                store_code,
            } => AppError::with_message(ErrorCode::AlreadyExists, "Record already exists")
                .with_detail("store_code", store_code.unwrap_or_default())
                .with_detail("store_message", message),
            RepoError::Constraint {
                message,
                store_code,
            } => AppError::with_message(ErrorCode::ValidationFailed, "Constraint violated")
                .with_detail("store_code", store_code.unwrap_or_default())
                .with_detail("store_message", message),
            RepoError::Stale(msg) => AppError::with_message(ErrorCode::StaleMemberState, msg),
            RepoError::Transient(msg) => {
                tracing::warn!("Transient store failure: {msg}");
                AppError::busy("Store temporarily unavailable")
            }
            RepoError::Database(msg) => {
                tracing::error!("Database error: {msg}");
                AppError::database("Database operation failed")
            }
        }
    }
}
