//! Phone number normalization
//!
//! Members are keyed by a 10-digit phone string. Anything typed by staff
//! (search boxes, new-member forms, corrections) goes through [`normalize`]
//! before it touches the store.

/// Length of a canonical phone key
pub const PHONE_DIGITS: usize = 10;

/// Strip every non-digit character.
///
/// Total: empty or digit-free input yields an empty string.
pub fn normalize(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Render as `(XXX) XXX-XXXX` when the input normalizes to exactly 10 digits,
/// otherwise return the input unchanged.
pub fn format(input: &str) -> String {
    let digits = normalize(input);
    if digits.len() != PHONE_DIGITS {
        return input.to_string();
    }
    format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10])
}

/// Whether the input normalizes to a canonical 10-digit key
pub fn is_valid(input: &str) -> bool {
    normalize(input).len() == PHONE_DIGITS
}
