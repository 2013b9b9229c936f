//! Input validation helpers
//!
//! Centralized text limits and request checks shared by the HTTP handlers
//! and the loyalty service. SQLite TEXT has no built-in length enforcement.

use crate::utils::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Member display names
pub const MAX_NAME_LEN: usize = 200;

/// Adjustment reasons and redemption notes
pub const MAX_NOTE_LEN: usize = 500;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

/// Search input
pub const MAX_QUERY_LEN: usize = 100;

// ── Punch limits ────────────────────────────────────────────────────

/// Largest single add accepted from the staff UI
pub const MAX_PUNCHES_PER_ADD: i64 = 20;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Phone must normalize to a 10-digit key; returns the canonical digits
pub fn validate_phone(input: &str) -> Result<String, AppError> {
    if !shared::phone::is_valid(input) {
        return Err(AppError::invalid_phone(input));
    }
    Ok(shared::phone::normalize(input))
}

/// Trim an optional email; blank becomes `None`
pub fn normalize_email(email: Option<&str>) -> Result<Option<String>, AppError> {
    let email = email.map(str::trim).filter(|e| !e.is_empty());
    if let Some(e) = email {
        if e.len() > MAX_EMAIL_LEN {
            return Err(AppError::validation(format!(
                "email is too long ({} chars, max {MAX_EMAIL_LEN})",
                e.len()
            )));
        }
        if !e.contains('@') {
            return Err(AppError::validation(format!("Invalid email: {e}")));
        }
    }
    Ok(email.map(str::to_string))
}

/// Add delta within `1..=MAX_PUNCHES_PER_ADD`
pub fn validate_add_delta(delta: i64) -> Result<(), AppError> {
    if !(1..=MAX_PUNCHES_PER_ADD).contains(&delta) {
        return Err(AppError::invalid_punch_delta(delta, 1, MAX_PUNCHES_PER_ADD));
    }
    Ok(())
}

/// Delta must be positive; oversized removals are clamped by the accumulator
pub fn validate_positive_delta(delta: i64) -> Result<(), AppError> {
    if delta < 1 {
        return Err(AppError::invalid_punch_delta(delta, 1, i64::MAX));
    }
    Ok(())
}

/// Caller's view of the balance must be a possible card state
pub fn validate_balance(punches: i64) -> Result<(), AppError> {
    if !(0..=shared::models::MAX_PUNCHES).contains(&punches) {
        return Err(AppError::new(shared::error::ErrorCode::PunchBalanceOutOfRange)
            .with_detail("punches", punches));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Jane", "name", MAX_NAME_LEN).is_ok());
        assert!(validate_required_text("   ", "name", MAX_NAME_LEN).is_err());
        assert!(validate_required_text(&"x".repeat(201), "name", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone("(817) 555-1234").unwrap(), "8175551234");
        let err = validate_phone("555-1234").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPhone);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(None).unwrap(), None);
        assert_eq!(normalize_email(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_email(Some(" jane@example.com ")).unwrap().as_deref(),
            Some("jane@example.com")
        );
        assert!(normalize_email(Some("not-an-email")).is_err());
    }

    #[test]
    fn test_deltas() {
        assert!(validate_add_delta(1).is_ok());
        assert!(validate_add_delta(20).is_ok());
        assert_eq!(
            validate_add_delta(0).unwrap_err().code,
            ErrorCode::InvalidPunchDelta
        );
        assert!(validate_add_delta(21).is_err());
        assert!(validate_positive_delta(100).is_ok());
        assert!(validate_positive_delta(0).is_err());
        assert!(validate_positive_delta(-3).is_err());
    }

    #[test]
    fn test_balance() {
        assert!(validate_balance(0).is_ok());
        assert!(validate_balance(9).is_ok());
        assert_eq!(
            validate_balance(10).unwrap_err().code,
            ErrorCode::PunchBalanceOutOfRange
        );
    }
}
