//! RxPad blob storage
//!
//! Rendered prescription PDFs (and hospital logos) live in object storage, not in the relational
//! store. This crate defines the boundary the core talks to and two implementations of it.
//!
//! ## Design Principles
//!
//! - Every object is private; reads go through time-limited signed URLs
//! - Keys are explicit, validated, slash-separated paths (see [`BlobKey`])
//! - Uploading to an existing key overwrites it, so retries never duplicate
//! - Expiry of signed URLs is enforced by whoever serves the bytes, never cached locally
//!
//! ## Backends
//!
//! - [`LocalBlobStore`] keeps objects on the local filesystem and signs download URLs with
//!   HMAC-SHA256; the REST layer serves them after verifying the signature.
//! - [`S3BlobStore`] talks to any S3-compatible service through the AWS SDK; downloads are
//!   presigned GETs.
//!
//! ## Example Usage
//!
//! ```no_run
//! use rxpad_files::{BlobKey, BlobStore, LocalBlobStore};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = LocalBlobStore::new(Path::new("blobs"), "http://localhost:3000", b"secret".to_vec())?;
//! let key = BlobKey::new("prescriptions/RX20250101ABCD1234/prescription_RX20250101ABCD1234.pdf")?;
//! store.upload(b"%PDF-1.4", &key, Some("application/pdf"))?;
//! let url = store.signed_url(&key, Duration::from_secs(3600))?;
//! # Ok(())
//! # }
//! ```

mod constants;
mod key;
mod local;
mod s3;
mod store;

pub use constants::{BLOBS_ROUTE_PREFIX, MAX_PRESIGN_TTL_SECS};
pub use key::BlobKey;
pub use local::LocalBlobStore;
pub use s3::{S3BlobStore, S3Config};
pub use store::{BlobStore, UploadedBlob};

/// Errors that can occur during blob operations
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// Key failed validation (empty, traversal, unsupported characters)
    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    /// No object stored under the key
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Store settings are unusable
    #[error("Invalid blob store configuration: {0}")]
    InvalidConfig(String),

    /// Signing failed or a presented signature did not verify
    #[error("Signature error: {0}")]
    Signature(String),

    /// A signed URL was presented after its expiry
    #[error("Signed URL has expired")]
    Expired,

    /// Remote store answered with a non-success status
    #[error("Object storage returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Request never got a response: transport, timeout or credential resolution
    #[error("Object storage request failed: {0}")]
    Backend(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;
