//! Validated object keys.

use crate::constants::MAX_KEY_LEN;
use crate::{BlobError, BlobResult};
use std::fmt;

/// A validated, slash-separated object key such as
/// `prescriptions/RX20250101ABCD1234/prescription_RX20250101ABCD1234.pdf`.
///
/// Each segment is non-empty, is not `.` or `..`, and uses only ASCII letters, digits, `.`,
/// `_` and `-`. Keys therefore never need URL escaping and can never leave the store root when
/// joined onto a filesystem path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobKey(String);

impl BlobKey {
    /// Validates `input` as an object key.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::InvalidKey`] describing the first rule that failed.
    pub fn new(input: impl Into<String>) -> BlobResult<Self> {
        let key = input.into();

        if key.is_empty() {
            return Err(BlobError::InvalidKey("key cannot be empty".into()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(BlobError::InvalidKey(format!(
                "key exceeds maximum length of {} bytes",
                MAX_KEY_LEN
            )));
        }

        for segment in key.split('/') {
            Self::validate_segment(segment).map_err(|reason| {
                BlobError::InvalidKey(format!("'{}': {}", key, reason))
            })?;
        }

        Ok(Self(key))
    }

    /// Joins already-separate segments into a key, validating each.
    pub fn from_segments(segments: &[&str]) -> BlobResult<Self> {
        Self::new(segments.join("/"))
    }

    fn validate_segment(segment: &str) -> Result<(), &'static str> {
        if segment.is_empty() {
            return Err("empty path segment");
        }
        if segment == "." || segment == ".." {
            return Err("relative path segment");
        }
        let ok = segment
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'_' | b'-'));
        if !ok {
            return Err("unsupported characters (only alphanumeric, '.', '_', '-' allowed)");
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this key sits under `prefix` (plain string prefix match).
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Returns the last segment of the key.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
