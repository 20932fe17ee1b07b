//! Validated primitive types shared across RxPad crates.
//!
//! Each type here can only be constructed through a checking constructor, so holders can rely on
//! the invariant without re-validating.

use chrono::NaiveDate;

/// Rejections from the checking constructors in this crate.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("value is required")]
    Empty,

    /// The input was not a strict `YYYY-MM-DD` calendar date
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Trimmed text with at least one character, used for required names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trims `input` and rejects what is left if it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] for empty or whitespace-only input.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parses a date that must be written exactly as `YYYY-MM-DD`.
///
/// Chrono's `%Y-%m-%d` accepts unpadded fields and signed years, so the shape is checked
/// byte-by-byte before the calendar check.
///
/// # Errors
///
/// Returns [`TextError::InvalidDate`] if the literal has the wrong shape or names a day that
/// does not exist (for example `2025-13-40` or `2025-02-30`).
pub fn parse_strict_date(input: &str) -> Result<NaiveDate, TextError> {
    let bytes = input.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());

    if !shaped {
        return Err(TextError::InvalidDate(input.to_owned()));
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| TextError::InvalidDate(input.to_owned()))
}
