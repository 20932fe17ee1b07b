//! Filesystem-backed blob store with HMAC-signed download URLs.
//!
//! # Storage Layout
//!
//! Keys map one-to-one onto paths under the store root:
//!
//! ```text
//! <root>/
//! └── prescriptions/
//!     └── RX20250101ABCD1234/
//!         └── prescription_RX20250101ABCD1234.pdf
//! ```
//!
//! # Signed URLs
//!
//! `{base_url}/blobs/{key}?expires={unix_seconds}&signature={hex}` where the signature is
//! HMAC-SHA256 over `"{key}\n{expires}"` with the store's signing key. The REST layer hands the
//! three parts to [`LocalBlobStore::open_signed`], which verifies the signature in constant time
//! before checking expiry and reading the object.

use crate::constants::BLOBS_ROUTE_PREFIX;
use crate::{BlobError, BlobKey, BlobResult, BlobStore, UploadedBlob};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Prefix `tempfile` gives in-flight uploads; such files are never listed.
const TEMP_PREFIX: &str = ".tmp";

/// Blob store rooted at a local directory.
#[derive(Debug)]
pub struct LocalBlobStore {
    /// Canonicalised store root
    root: PathBuf,

    /// Public origin of the REST server, without trailing slash
    base_url: String,

    signing_key: Vec<u8>,
}

impl LocalBlobStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory holding the objects
    /// * `base_url` - Origin used to build download URLs, e.g. `http://localhost:3000`
    /// * `signing_key` - Secret used to sign download URLs
    ///
    /// # Errors
    ///
    /// Returns `BlobError` if:
    /// - the signing key is empty or the base URL is not http(s) ([`BlobError::InvalidConfig`])
    /// - the root cannot be created or canonicalised (I/O)
    pub fn new(
        root: &Path,
        base_url: impl Into<String>,
        signing_key: Vec<u8>,
    ) -> BlobResult<Self> {
        if signing_key.is_empty() {
            return Err(BlobError::InvalidConfig(
                "local blob signing key cannot be empty".into(),
            ));
        }

        let base_url = base_url.into().trim_end_matches('/').to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(BlobError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;

        Ok(Self {
            root,
            base_url,
            signing_key,
        })
    }

    /// Returns the canonicalised store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &BlobKey) -> PathBuf {
        key.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn object_url(&self, key: &BlobKey) -> String {
        format!("{}{}/{}", self.base_url, BLOBS_ROUTE_PREFIX, key)
    }

    fn mac(&self, key: &BlobKey, expires: i64) -> BlobResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| BlobError::Signature(e.to_string()))?;
        mac.update(format!("{}\n{}", key, expires).as_bytes());
        Ok(mac)
    }

    /// Signs a download URL for `key` valid until `now + ttl`.
    pub fn signed_url_at(
        &self,
        key: &BlobKey,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> BlobResult<String> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = now.timestamp().saturating_add(ttl_secs);
        let signature = hex::encode(self.mac(key, expires)?.finalize().into_bytes());

        Ok(format!(
            "{}?expires={}&signature={}",
            self.object_url(key),
            expires,
            signature
        ))
    }

    /// Verifies a signed download request and returns the object bytes.
    ///
    /// # Arguments
    ///
    /// * `key` - Raw key taken from the request path
    /// * `expires` - Unix expiry taken from the query string
    /// * `signature` - Hex signature taken from the query string
    /// * `now` - Current time
    ///
    /// # Errors
    ///
    /// Returns `BlobError` if:
    /// - the key is invalid ([`BlobError::InvalidKey`])
    /// - the signature is malformed or does not match ([`BlobError::Signature`])
    /// - the URL has expired ([`BlobError::Expired`])
    /// - no object exists under the key ([`BlobError::NotFound`])
    pub fn open_signed(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> BlobResult<Vec<u8>> {
        let key = BlobKey::new(key)?;

        let presented = hex::decode(signature)
            .map_err(|_| BlobError::Signature("malformed signature".into()))?;
        self.mac(&key, expires)?
            .verify_slice(&presented)
            .map_err(|_| BlobError::Signature("signature mismatch".into()))?;

        if now.timestamp() > expires {
            return Err(BlobError::Expired);
        }

        self.read(&key)
    }

    /// Convenience wrapper over [`LocalBlobStore::open_signed`] taking a full URL as produced by
    /// [`BlobStore::signed_url`].
    pub fn open_signed_url(&self, url: &str, now: DateTime<Utc>) -> BlobResult<Vec<u8>> {
        let malformed = || BlobError::Signature(format!("not a signed URL for this store: {}", url));

        let prefix = format!("{}{}/", self.base_url, BLOBS_ROUTE_PREFIX);
        let rest = url.strip_prefix(&prefix).ok_or_else(malformed)?;
        let (key, query) = rest.split_once('?').ok_or_else(malformed)?;

        let mut expires = None;
        let mut signature = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse::<i64>().ok(),
                Some(("signature", v)) => signature = Some(v),
                _ => {}
            }
        }

        match (expires, signature) {
            (Some(expires), Some(signature)) => self.open_signed(key, expires, signature, now),
            _ => Err(malformed()),
        }
    }

    fn read(&self, key: &BlobKey) -> BlobResult<Vec<u8>> {
        let path = self.object_path(key);
        if !path.is_file() {
            return Err(BlobError::NotFound(key.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn collect_keys(&self, dir: &Path, prefix: &str, out: &mut Vec<BlobKey>) -> BlobResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.collect_keys(&entry.path(), prefix, out)?;
            } else if file_type.is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(&self.root)
                    .map(|p| {
                        p.components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect::<Vec<_>>()
                            .join("/")
                    })
                    .unwrap_or_default();

                match BlobKey::new(relative) {
                    Ok(key) if key.starts_with(prefix) => out.push(key),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("skipping unaddressable file in blob store: {}", e),
                }
            }
        }
        Ok(())
    }
}

impl BlobStore for LocalBlobStore {
    fn upload(
        &self,
        bytes: &[u8],
        key: &BlobKey,
        content_type: Option<&str>,
    ) -> BlobResult<UploadedBlob> {
        let path = self.object_path(key);
        let parent = path
            .parent()
            .ok_or_else(|| BlobError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent)?;

        if let (Some(declared), Some(kind)) = (content_type, infer::get(bytes)) {
            if kind.mime_type() != declared {
                tracing::warn!(
                    "blob {} declared as {} but looks like {}",
                    key,
                    declared,
                    kind.mime_type()
                );
            }
        }

        // Write-then-rename so readers never observe a half-written object.
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.persist(&path).map_err(|e| BlobError::Io(e.error))?;

        tracing::debug!("stored {} bytes at {}", bytes.len(), key);

        Ok(UploadedBlob {
            path: key.to_string(),
            secure_url: self.object_url(key),
        })
    }

    fn signed_url(&self, key: &BlobKey, ttl: Duration) -> BlobResult<String> {
        self.signed_url_at(key, ttl, Utc::now())
    }

    fn exists(&self, key: &BlobKey) -> BlobResult<bool> {
        Ok(self.object_path(key).is_file())
    }

    fn list(&self, prefix: &str) -> BlobResult<Vec<BlobKey>> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, prefix, &mut keys)?;
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF";

    fn test_store(dir: &TempDir) -> LocalBlobStore {
        LocalBlobStore::new(dir.path(), "http://localhost:3000/", b"test-key".to_vec())
            .expect("store should open")
    }

    fn rx_key() -> BlobKey {
        BlobKey::new("prescriptions/RX20250101ABCD1234/prescription_RX20250101ABCD1234.pdf")
            .unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_signing_key() {
        let dir = TempDir::new().unwrap();
        let result = LocalBlobStore::new(dir.path(), "http://localhost", Vec::new());
        assert!(matches!(result, Err(BlobError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_non_http_base_url() {
        let dir = TempDir::new().unwrap();
        let result = LocalBlobStore::new(dir.path(), "ftp://host", b"k".to_vec());
        assert!(matches!(result, Err(BlobError::InvalidConfig(_))));
    }

    #[test]
    fn test_upload_writes_under_key_path() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let uploaded = store.upload(PDF, &rx_key(), Some("application/pdf")).unwrap();

        assert_eq!(uploaded.path, rx_key().as_str());
        assert_eq!(
            uploaded.secure_url,
            format!("http://localhost:3000/blobs/{}", rx_key())
        );
        let on_disk = store
            .root()
            .join("prescriptions")
            .join("RX20250101ABCD1234")
            .join("prescription_RX20250101ABCD1234.pdf");
        assert_eq!(fs::read(on_disk).unwrap(), PDF);
    }

    #[test]
    fn test_upload_same_key_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        store.upload(b"first", &rx_key(), None).unwrap();
        store.upload(PDF, &rx_key(), None).unwrap();

        assert_eq!(store.list("prescriptions/").unwrap(), vec![rx_key()]);
        assert_eq!(store.read(&rx_key()).unwrap(), PDF);
    }

    #[test]
    fn test_signed_url_round_trip_returns_bytes() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.upload(PDF, &rx_key(), None).unwrap();

        let url = store
            .signed_url_at(&rx_key(), Duration::from_secs(3600), fixed_now())
            .unwrap();
        let bytes = store.open_signed_url(&url, fixed_now()).unwrap();

        assert_eq!(bytes, PDF);
    }

    #[test]
    fn test_signed_url_expires() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.upload(PDF, &rx_key(), None).unwrap();

        let url = store
            .signed_url_at(&rx_key(), Duration::from_secs(60), fixed_now())
            .unwrap();
        let later = fixed_now() + chrono::Duration::seconds(61);

        assert!(matches!(
            store.open_signed_url(&url, later),
            Err(BlobError::Expired)
        ));
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.upload(PDF, &rx_key(), None).unwrap();

        let expires = fixed_now().timestamp() + 3600;
        let result = store.open_signed(rx_key().as_str(), expires, &"00".repeat(32), fixed_now());

        assert!(matches!(result, Err(BlobError::Signature(_))));
    }

    #[test]
    fn test_signature_is_bound_to_key() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let other = BlobKey::new("prescriptions/RX20250101FFFF0000/x.pdf").unwrap();
        store.upload(PDF, &rx_key(), None).unwrap();
        store.upload(b"other", &other, None).unwrap();

        let url = store
            .signed_url_at(&rx_key(), Duration::from_secs(3600), fixed_now())
            .unwrap();
        let forged = url.replace(rx_key().as_str(), other.as_str());

        assert!(matches!(
            store.open_signed_url(&forged, fixed_now()),
            Err(BlobError::Signature(_))
        ));
    }

    #[test]
    fn test_open_signed_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let url = store
            .signed_url_at(&rx_key(), Duration::from_secs(3600), fixed_now())
            .unwrap();

        assert!(matches!(
            store.open_signed_url(&url, fixed_now()),
            Err(BlobError::NotFound(_))
        ));
    }

    #[test]
    fn test_exists_and_list_by_prefix() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let logo = BlobKey::new("hospital_logos/1/logo_1.png").unwrap();

        assert!(!store.exists(&rx_key()).unwrap());
        store.upload(PDF, &rx_key(), None).unwrap();
        store.upload(b"png", &logo, None).unwrap();

        assert!(store.exists(&rx_key()).unwrap());
        assert_eq!(store.list("prescriptions/").unwrap(), vec![rx_key()]);
        assert_eq!(store.list("").unwrap(), vec![logo, rx_key()]);
    }
}
