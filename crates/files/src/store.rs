//! The object storage boundary.

use crate::{BlobKey, BlobResult};
use std::time::Duration;

/// Result of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadedBlob {
    /// Storage path to record against the owning entity (the key itself).
    pub path: String,

    /// Canonical object URL. Objects are private, so this URL is not readable on its own;
    /// use [`BlobStore::signed_url`] to mint a time-limited link.
    pub secure_url: String,
}

/// Private object storage with signed-URL retrieval.
///
/// All calls are blocking. Callers running on an async runtime should move them onto a
/// blocking thread.
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::BlobError`] if the object could not be written.
    fn upload(
        &self,
        bytes: &[u8],
        key: &BlobKey,
        content_type: Option<&str>,
    ) -> BlobResult<UploadedBlob>;

    /// Mints a URL that grants read access to `key` for `ttl`.
    ///
    /// Signing does not check that the object exists; use [`BlobStore::exists`] for that.
    fn signed_url(&self, key: &BlobKey, ttl: Duration) -> BlobResult<String>;

    /// Returns whether an object is stored under `key`.
    fn exists(&self, key: &BlobKey) -> BlobResult<bool>;

    /// Lists every key that starts with `prefix`, sorted.
    fn list(&self, prefix: &str) -> BlobResult<Vec<BlobKey>>;
}
