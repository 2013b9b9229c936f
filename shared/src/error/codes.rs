//! Unified error codes for the loyalty service
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Loyalty errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// Staff session is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,

    // ==================== 4xxx: Loyalty ====================
    /// Loyalty member not found
    MemberNotFound = 4001,
    /// Another member already uses this phone number
    PhoneAlreadyExists = 4002,
    /// Member changed since the caller last read it
    StaleMemberState = 4003,
    /// Card does not hold enough punches for a reward
    RewardNotReady = 4004,
    /// Phone number cannot be normalized to 10 digits
    InvalidPhone = 4005,
    /// Punch delta outside the accepted range
    InvalidPunchDelta = 4006,
    /// Store rejected a punch balance outside 0..=9
    PunchBalanceOutOfRange = 4007,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timed out
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,

    // ==================== 94xx: Storage ====================
    /// Storage full (disk space insufficient)
    StorageFull = 9401,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
    /// System busy (database locked, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "Staff session is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",

            // Loyalty
            ErrorCode::MemberNotFound => "Loyalty member not found",
            ErrorCode::PhoneAlreadyExists => "A member with this phone number already exists",
            ErrorCode::StaleMemberState => "Member was changed by another session, reload and retry",
            ErrorCode::RewardNotReady => "Card does not have enough punches for a reward",
            ErrorCode::InvalidPhone => "Phone number must have 10 digits",
            ErrorCode::InvalidPunchDelta => "Punch count is out of range",
            ErrorCode::PunchBalanceOutOfRange => "Punch balance must stay between 0 and 9",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",

            // Storage
            ErrorCode::StorageFull => "Storage full (disk space insufficient)",
            ErrorCode::StorageCorrupted => "Storage corrupted (data file damaged)",
            ErrorCode::SystemBusy => "System busy, please retry later",
        }
    }

    /// Whether a client may retry the same request unchanged
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError | ErrorCode::TimeoutError | ErrorCode::SystemBusy
        )
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),

            // Loyalty
            4001 => Ok(ErrorCode::MemberNotFound),
            4002 => Ok(ErrorCode::PhoneAlreadyExists),
            4003 => Ok(ErrorCode::StaleMemberState),
            4004 => Ok(ErrorCode::RewardNotReady),
            4005 => Ok(ErrorCode::InvalidPhone),
            4006 => Ok(ErrorCode::InvalidPunchDelta),
            4007 => Ok(ErrorCode::PunchBalanceOutOfRange),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            // Storage
            9401 => Ok(ErrorCode::StorageFull),
            9403 => Ok(ErrorCode::StorageCorrupted),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::PermissionDenied.code(), 2001);
        assert_eq!(ErrorCode::MemberNotFound.code(), 4001);
        assert_eq!(ErrorCode::PhoneAlreadyExists.code(), 4002);
        assert_eq!(ErrorCode::StaleMemberState.code(), 4003);
        assert_eq!(ErrorCode::RewardNotReady.code(), 4004);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
        assert_eq!(ErrorCode::DatabaseError.code(), 9002);
        assert_eq!(ErrorCode::SystemBusy.code(), 9404);
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::Unknown.is_success());
        assert!(!ErrorCode::MemberNotFound.is_success());
    }

    #[test]
    fn test_is_transient() {
        assert!(ErrorCode::SystemBusy.is_transient());
        assert!(ErrorCode::TimeoutError.is_transient());
        assert!(!ErrorCode::PhoneAlreadyExists.is_transient());
        assert!(!ErrorCode::StaleMemberState.is_transient());
    }

    #[test]
    fn test_try_from_valid() {
        assert_eq!(ErrorCode::try_from(0), Ok(ErrorCode::Success));
        assert_eq!(ErrorCode::try_from(4002), Ok(ErrorCode::PhoneAlreadyExists));
        assert_eq!(ErrorCode::try_from(9404), Ok(ErrorCode::SystemBusy));
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&ErrorCode::MemberNotFound).unwrap();
        assert_eq!(json, "4001");
    }

    #[test]
    fn test_deserialize() {
        let code: ErrorCode = serde_json::from_str("4003").unwrap();
        assert_eq!(code, ErrorCode::StaleMemberState);
    }

    #[test]
    fn test_deserialize_invalid() {
        let result: Result<ErrorCode, _> = serde_json::from_str("12345");
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorCode::PhoneAlreadyExists), "4002");
    }

    #[test]
    fn test_roundtrip_all_listed_codes() {
        let codes = [
            ErrorCode::Success,
            ErrorCode::InvalidRequest,
            ErrorCode::TokenExpired,
            ErrorCode::MemberNotFound,
            ErrorCode::InvalidPhone,
            ErrorCode::InvalidPunchDelta,
            ErrorCode::PunchBalanceOutOfRange,
            ErrorCode::ConfigError,
            ErrorCode::StorageFull,
            ErrorCode::StorageCorrupted,
        ];
        for code in codes {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }
}
