//! Internal implementation of external identifier generation and parsing.

use crate::{IdentError, IdentResult};
use chrono::{Local, NaiveDate};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Length of the `YYYYMMDD` date stamp.
const DATE_LEN: usize = 8;

/// Length of the uppercase hex suffix.
const SUFFIX_LEN: usize = 8;

/// The kind of record an external identifier addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdPrefix {
    /// `PT` identifiers.
    Patient,
    /// `RX` identifiers.
    Prescription,
}

impl IdPrefix {
    /// Returns the literal prefix written at the start of the identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            IdPrefix::Patient => "PT",
            IdPrefix::Prescription => "RX",
        }
    }

    fn detect(input: &str) -> Option<Self> {
        [IdPrefix::Patient, IdPrefix::Prescription]
            .into_iter()
            .find(|p| input.starts_with(p.as_str()))
    }
}

impl fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated external identifier (`<prefix><YYYYMMDD><8 uppercase hex>`).
///
/// Once constructed the value is known to be well formed, so it can be embedded in storage
/// keys and filenames without further checks.
///
/// # Construction
/// - [`ExternalId::generate`] allocates a fresh identifier dated today.
/// - [`ExternalId::parse`] validates an externally supplied identifier of a known kind.
/// - [`FromStr`] accepts either kind and detects the prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId {
    prefix: IdPrefix,
    value: String,
}

impl ExternalId {
    /// Generates a new identifier stamped with the current local date.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Kind of record the identifier is for.
    ///
    /// # Returns
    ///
    /// A fresh identifier. Two calls return distinct values with probability 1 - 2^-32.
    pub fn generate(prefix: IdPrefix) -> Self {
        Self::generate_on(prefix, Local::now().date_naive())
    }

    /// Generates a new identifier stamped with `date`.
    pub fn generate_on(prefix: IdPrefix, date: NaiveDate) -> Self {
        // The top 32 bits of a v4 UUID are all random.
        let suffix = (Uuid::new_v4().as_u128() >> 96) as u32;
        Self {
            prefix,
            value: format!("{}{}{:08X}", prefix.as_str(), date.format("%Y%m%d"), suffix),
        }
    }

    /// Validates and wraps an identifier that must carry `prefix`.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The expected kind.
    /// * `input` - Candidate identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentError::InvalidInput`] if the prefix differs, the date stamp is not a real
    /// calendar date, or the suffix is not exactly eight uppercase hex characters.
    pub fn parse(prefix: IdPrefix, input: &str) -> IdentResult<Self> {
        if Self::is_well_formed(prefix, input) {
            return Ok(Self {
                prefix,
                value: input.to_owned(),
            });
        }
        Err(IdentError::InvalidInput(format!(
            "expected {}<YYYYMMDD><8 uppercase hex>, got: '{}'",
            prefix, input
        )))
    }

    /// Returns true if `input` is a well formed identifier of kind `prefix`.
    ///
    /// This is a purely syntactic check plus a calendar check on the date stamp.
    pub fn is_well_formed(prefix: IdPrefix, input: &str) -> bool {
        let p = prefix.as_str();
        if !input.is_ascii()
            || input.len() != p.len() + DATE_LEN + SUFFIX_LEN
            || !input.starts_with(p)
        {
            return false;
        }

        let rest = &input[p.len()..];
        let (date, suffix) = rest.split_at(DATE_LEN);

        date.bytes().all(|b| b.is_ascii_digit())
            && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
            && suffix
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F'))
    }

    /// Returns the kind of this identifier.
    pub fn prefix(&self) -> IdPrefix {
        self.prefix
    }

    /// Returns the date stamp embedded in this identifier.
    pub fn date(&self) -> NaiveDate {
        let start = self.prefix.as_str().len();
        // Guaranteed valid by construction.
        NaiveDate::parse_from_str(&self.value[start..start + DATE_LEN], "%Y%m%d")
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for ExternalId {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl FromStr for ExternalId {
    type Err = IdentError;

    /// Parses an identifier of either kind, detecting the prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let prefix = IdPrefix::detect(s).ok_or_else(|| {
            IdentError::InvalidInput(format!("unknown identifier prefix: '{}'", s))
        })?;
        ExternalId::parse(prefix, s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ExternalId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.value)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ExternalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Generates an identifier string for `prefix`.
///
/// Convenience wrapper over [`ExternalId::generate`] for callers that only need the text.
pub fn new_identifier(prefix: IdPrefix) -> String {
    ExternalId::generate(prefix).to_string()
}

/// Source of fresh identifiers.
///
/// Stores take an `Arc<dyn IdentifierSource>` so tests can substitute deterministic sequences.
pub trait IdentifierSource: Send + Sync {
    fn next_id(&self, prefix: IdPrefix) -> ExternalId;
}

/// Default [`IdentifierSource`] backed by [`ExternalId::generate`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIdentifiers;

impl IdentifierSource for RandomIdentifiers {
    fn next_id(&self, prefix: IdPrefix) -> ExternalId {
        ExternalId::generate(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_shape(id: &str, prefix: &str) {
        assert_eq!(id.len(), 18, "unexpected length for {id}");
        assert!(id.starts_with(prefix));
        assert!(id[2..10].bytes().all(|b| b.is_ascii_digit()));
        assert!(id[10..]
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F')));
    }

    #[test]
    fn test_new_identifier_shape_for_both_prefixes() {
        assert_shape(&new_identifier(IdPrefix::Patient), "PT");
        assert_shape(&new_identifier(IdPrefix::Prescription), "RX");
    }

    #[test]
    fn test_generate_uses_current_date() {
        let today = Local::now().date_naive();
        let id = ExternalId::generate(IdPrefix::Prescription);
        // Allow for the test running across midnight.
        let date = id.date();
        assert!(date == today || date == today.succ_opt().unwrap());
    }

    #[test]
    fn test_generate_on_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let id = ExternalId::generate_on(IdPrefix::Prescription, date);

        assert!(id.as_str().starts_with("RX20250101"));
        assert_eq!(id.date(), date);
        assert_eq!(id.prefix(), IdPrefix::Prescription);
    }

    #[test]
    fn test_successive_identifiers_differ() {
        let ids: HashSet<String> = (0..100)
            .map(|_| new_identifier(IdPrefix::Patient))
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_parse_valid() {
        let id = ExternalId::parse(IdPrefix::Prescription, "RX20250101ABCD1234").unwrap();
        assert_eq!(id.to_string(), "RX20250101ABCD1234");
    }

    #[test]
    fn test_parse_rejects_wrong_prefix() {
        assert!(ExternalId::parse(IdPrefix::Patient, "RX20250101ABCD1234").is_err());
    }

    #[test]
    fn test_parse_rejects_lowercase_suffix() {
        assert!(ExternalId::parse(IdPrefix::Prescription, "RX20250101abcd1234").is_err());
    }

    #[test]
    fn test_parse_rejects_impossible_date() {
        assert!(ExternalId::parse(IdPrefix::Prescription, "RX20251340ABCD1234").is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(ExternalId::parse(IdPrefix::Prescription, "RX20250101ABCD123").is_err());
        assert!(ExternalId::parse(IdPrefix::Prescription, "RX20250101ABCD12345").is_err());
        assert!(ExternalId::parse(IdPrefix::Prescription, "").is_err());
    }

    #[test]
    fn test_parse_rejects_path_characters() {
        assert!(ExternalId::parse(IdPrefix::Prescription, "RX20250101../../x").is_err());
    }

    #[test]
    fn test_from_str_detects_prefix() {
        let patient: ExternalId = "PT20250101ABCD1234".parse().unwrap();
        let rx: ExternalId = "RX20250101ABCD1234".parse().unwrap();

        assert_eq!(patient.prefix(), IdPrefix::Patient);
        assert_eq!(rx.prefix(), IdPrefix::Prescription);
        assert!("ZZ20250101ABCD1234".parse::<ExternalId>().is_err());
    }

    #[test]
    fn test_serde_round_trip_as_string() {
        let id = ExternalId::parse(IdPrefix::Patient, "PT20250101ABCD1234").unwrap();
        let json = serde_json::to_string(&id).unwrap();

        assert_eq!(json, "\"PT20250101ABCD1234\"");
        let back: ExternalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_random_identifiers_source() {
        let source = RandomIdentifiers;
        let id = source.next_id(IdPrefix::Prescription);
        assert!(ExternalId::is_well_formed(IdPrefix::Prescription, id.as_str()));
    }
}
