//! External identifiers for patients and prescriptions.
//!
//! Every record RxPad exposes to end users is addressed by an *external identifier*, distinct
//! from the database primary key. The format is:
//!
//! `<prefix><YYYYMMDD><8 uppercase hex characters>`
//!
//! Examples:
//! - `PT20250101ABCD1234` (patient)
//! - `RX20250101ABCD1234` (prescription)
//!
//! The date stamp is the local calendar date at generation time. The suffix is the first eight
//! hex characters of a fresh v4 UUID, i.e. 32 random bits.
//!
//! ## Uniqueness
//! No lookup against the store happens at generation time. Uniqueness is probabilistic and is
//! enforced by a unique constraint at insertion, where a collision surfaces as a conflict
//! rather than an overwrite.
//!
//! ## Substitution
//! Stores draw identifiers through the [`IdentifierSource`] trait so tests can inject fixed
//! sequences (for example to force a collision).

mod service;

pub use service::{new_identifier, ExternalId, IdPrefix, IdentifierSource, RandomIdentifiers};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentError {
    /// Invalid input provided
    #[error("Invalid identifier: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdentResult<T> = Result<T, IdentError>;
