//! Error types and API response structures

use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// This is the one error shape every failure is normalized into before it
/// reaches a client:
/// - Standardized error codes via [`ErrorCode`]
/// - Human-readable messages
/// - Optional structured details (store error codes, expected values, ...)
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field-level errors, context, etc.)
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    // ==================== Convenience constructors ====================

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        let r = resource.into();
        Self::with_message(ErrorCode::NotFound, format!("{} not found", r))
            .with_detail("resource", r)
    }

    /// Create a not authenticated error
    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    /// Create a permission denied error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::PermissionDenied, msg)
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::DatabaseError, msg)
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidRequest, msg)
    }

    /// Create an invalid token error
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::TokenInvalid, msg)
    }

    /// Create a token expired error
    pub fn token_expired() -> Self {
        Self::new(ErrorCode::TokenExpired)
    }

    /// Create an unauthorized error (alias for not_authenticated)
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    /// Create a "system busy" error for transient store failures
    pub fn busy(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::SystemBusy, msg)
    }

    // ==================== Loyalty constructors ====================

    /// Member does not exist (never created, or deleted by another session)
    pub fn member_not_found(member_id: i64) -> Self {
        Self::with_message(
            ErrorCode::MemberNotFound,
            format!("Member {} not found", member_id),
        )
        .with_detail("member_id", member_id)
    }

    /// Phone number already belongs to another member
    pub fn phone_taken(phone: impl Into<String>) -> Self {
        let phone = phone.into();
        Self::with_message(
            ErrorCode::PhoneAlreadyExists,
            format!("A member with phone {} already exists", phone),
        )
        .with_detail("phone", phone)
    }

    /// Member row no longer matches the caller's view of it
    pub fn stale_member(member_id: i64) -> Self {
        Self::new(ErrorCode::StaleMemberState).with_detail("member_id", member_id)
    }

    /// Not enough punches for a reward
    pub fn reward_not_ready(punches: i64, required: i64) -> Self {
        Self::with_message(
            ErrorCode::RewardNotReady,
            format!("Card has {} of {} punches", punches, required),
        )
        .with_detail("punches", punches)
        .with_detail("required", required)
    }

    /// Phone input does not normalize to a 10-digit key
    pub fn invalid_phone(input: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPhone).with_detail("input", input.into())
    }

    /// Punch delta outside `min..=max`
    pub fn invalid_punch_delta(delta: i64, min: i64, max: i64) -> Self {
        Self::with_message(
            ErrorCode::InvalidPunchDelta,
            format!("Punch count must be between {} and {}, got {}", min, max, delta),
        )
        .with_detail("delta", delta)
        .with_detail("min", min)
        .with_detail("max", max)
    }
}

/// Unified API response structure
///
/// Provides a consistent response format for all API endpoints:
/// - `code`: Error code (0 for success)
/// - `message`: Human-readable message
/// - `data`: Response payload (on success)
/// - `details`: Additional error details (on failure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Error code (0 for success, non-zero for errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Human-readable message
    pub message: String,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Additional error details (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            code: Some(0),
            message: "OK".to_string(),
            data: Some(data),
            details: None,
        }
    }
}

impl ApiResponse<()> {
    /// Create a success response without data
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            message: "OK".to_string(),
            data: None,
            details: None,
        }
    }

    /// Create an error response from an AppError
    pub fn error(err: &AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
            details: err.details.clone(),
        }
    }
}

impl<T> From<AppError> for ApiResponse<T> {
    fn from(err: AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message,
            data: None,
            details: err.details,
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = self.http_status();
        let body = ApiResponse::<()>::error(&self);

        // Log system errors
        if matches!(self.code.category(), super::category::ErrorCategory::System) {
            tracing::error!(
                code = %self.code,
                message = %self.message,
                "System error occurred"
            );
        }

        (status, Json(body)).into_response()
    }
}

impl<T: Serialize> axum::response::IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        use super::codes::ErrorCode;
        use axum::Json;

        let status = if self.code == Some(0) || self.code.is_none() {
            http::StatusCode::OK
        } else {
            ErrorCode::try_from(self.code.unwrap_or(1))
                .map(|c| c.http_status())
                .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
        };

        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_new() {
        let err = AppError::new(ErrorCode::MemberNotFound);
        assert_eq!(err.code, ErrorCode::MemberNotFound);
        assert_eq!(err.message, "Loyalty member not found");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_app_error_with_detail() {
        let err = AppError::validation("Missing required fields")
            .with_detail("field", "name")
            .with_detail("reason", "required");

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap();
        assert_eq!(details.get("field").unwrap(), "name");
        assert_eq!(details.get("reason").unwrap(), "required");
    }

    #[test]
    fn test_loyalty_constructors() {
        let err = AppError::member_not_found(42);
        assert_eq!(err.code, ErrorCode::MemberNotFound);
        assert_eq!(err.message, "Member 42 not found");
        assert_eq!(err.details.as_ref().unwrap()["member_id"], 42);

        let err = AppError::phone_taken("8175551234");
        assert_eq!(err.code, ErrorCode::PhoneAlreadyExists);
        assert_eq!(err.http_status(), StatusCode::CONFLICT);

        let err = AppError::reward_not_ready(4, 9);
        assert_eq!(err.message, "Card has 4 of 9 punches");
        assert_eq!(err.http_status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::invalid_punch_delta(0, 1, 20);
        assert_eq!(err.code, ErrorCode::InvalidPunchDelta);
        assert_eq!(err.details.as_ref().unwrap()["max"], 20);
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::with_message(ErrorCode::NotFound, "History not found");
        assert_eq!(format!("{}", err), "History not found");
    }

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success(42);
        assert_eq!(response.code, Some(0));
        assert_eq!(response.message, "OK");
        assert_eq!(response.data, Some(42));
        assert!(response.details.is_none());
    }

    #[test]
    fn test_api_response_error() {
        let err = AppError::stale_member(7);
        let response = ApiResponse::<()>::error(&err);

        assert_eq!(response.code, Some(4003));
        assert!(response.data.is_none());
        assert_eq!(response.details.unwrap()["member_id"], 7);
    }

    #[test]
    fn test_api_response_serialize() {
        let response = ApiResponse::success("hello");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"code\":0"));
        assert!(json.contains("\"message\":\"OK\""));
        assert!(json.contains("\"data\":\"hello\""));
    }

    #[test]
    fn test_api_response_deserialize() {
        let json = r#"{"code":4001,"message":"Member 1 not found","details":{"member_id":1}}"#;
        let response: ApiResponse<()> = serde_json::from_str(json).unwrap();
        assert_eq!(response.code, Some(4001));
        assert!(response.data.is_none());
    }
}
