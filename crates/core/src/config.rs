//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as an
//! `Arc<CoreConfig>`. Nothing under this crate reads environment variables while handling a
//! request; the parsers below take the raw values (or a lookup function) so binaries decide where
//! values come from and tests can supply them directly.

use crate::constants::{
    DEFAULT_BLOB_DIR, DEFAULT_DATABASE_PATH, DEFAULT_DOWNLOAD_URL_TTL_SECS,
    DEFAULT_PUBLIC_BASE_URL, DEFAULT_WKHTMLTOPDF_PATH,
};
use crate::{RxError, RxResult};
use rxpad_files::{BlobStore, LocalBlobStore, S3BlobStore, S3Config, MAX_PRESIGN_TTL_SECS};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Which blob store backs artifact archival, with its settings.
#[derive(Clone)]
pub enum BlobBackend {
    /// Objects on the local filesystem, served through the REST `/blobs` route
    Local {
        root: PathBuf,
        public_base_url: String,
        signing_key: Vec<u8>,
    },

    /// An S3-compatible bucket
    S3(S3Config),
}

impl fmt::Debug for BlobBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobBackend::Local {
                root,
                public_base_url,
                ..
            } => f
                .debug_struct("Local")
                .field("root", root)
                .field("public_base_url", public_base_url)
                .field("signing_key", &"<redacted>")
                .finish(),
            BlobBackend::S3(cfg) => f.debug_tuple("S3").field(cfg).finish(),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    blob_backend: BlobBackend,
    wkhtmltopdf_path: PathBuf,
    download_url_ttl: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`RxError::InvalidConfig`] if `download_url_ttl` is zero or longer than the
    /// seven-day presigning limit.
    pub fn new(
        database_path: PathBuf,
        blob_backend: BlobBackend,
        wkhtmltopdf_path: PathBuf,
        download_url_ttl: Duration,
    ) -> RxResult<Self> {
        validate_ttl_secs(download_url_ttl.as_secs())?;

        Ok(Self {
            database_path,
            blob_backend,
            wkhtmltopdf_path,
            download_url_ttl,
        })
    }

    /// Resolves the full configuration through `lookup`, typically `|k| std::env::var(k).ok()`.
    ///
    /// # Environment Variables
    /// - `DATABASE_URL`: see [`database_path_from_env_value`]
    /// - `RX_BLOB_BACKEND` and friends: see [`blob_backend_from_env`]
    /// - `WKHTMLTOPDF_PATH`: renderer binary (default `wkhtmltopdf` on `PATH`)
    /// - `RX_DOWNLOAD_URL_TTL_SECS`: see [`ttl_from_env_value`]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RxResult<Self> {
        let database_path = database_path_from_env_value(lookup("DATABASE_URL"))?;
        let blob_backend = blob_backend_from_env(&lookup)?;
        let wkhtmltopdf_path = non_empty(lookup("WKHTMLTOPDF_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WKHTMLTOPDF_PATH));
        let ttl = ttl_from_env_value(lookup("RX_DOWNLOAD_URL_TTL_SECS"))?;

        Self::new(database_path, blob_backend, wkhtmltopdf_path, ttl)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn blob_backend(&self) -> &BlobBackend {
        &self.blob_backend
    }

    pub fn wkhtmltopdf_path(&self) -> &Path {
        &self.wkhtmltopdf_path
    }

    pub fn download_url_ttl(&self) -> Duration {
        self.download_url_ttl
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_ttl_secs(secs: u64) -> RxResult<()> {
    if secs == 0 || secs > MAX_PRESIGN_TTL_SECS {
        return Err(RxError::InvalidConfig(format!(
            "download URL TTL must be between 1 and {} seconds, got {}",
            MAX_PRESIGN_TTL_SECS, secs
        )));
    }
    Ok(())
}

/// Parse the database location from an optional `DATABASE_URL` value.
///
/// Accepts a plain path or a `sqlite://` URL. `sqlite:///relative.db` names a path relative to
/// the working directory and `sqlite:////abs/path.db` an absolute one. If `value` is `None` or
/// empty, returns [`DEFAULT_DATABASE_PATH`].
///
/// # Errors
///
/// Returns [`RxError::InvalidConfig`] for non-SQLite URLs or an empty path.
pub fn database_path_from_env_value(value: Option<String>) -> RxResult<PathBuf> {
    let Some(value) = non_empty(value) else {
        return Ok(PathBuf::from(DEFAULT_DATABASE_PATH));
    };

    let path = if let Some(rest) = value.strip_prefix("sqlite:///") {
        rest.to_string()
    } else if let Some(rest) = value.strip_prefix("sqlite://") {
        rest.to_string()
    } else if value.contains("://") {
        return Err(RxError::InvalidConfig(format!(
            "only sqlite databases are supported, got '{}'",
            value
        )));
    } else {
        value
    };

    if path.is_empty() {
        return Err(RxError::InvalidConfig("DATABASE_URL has an empty path".into()));
    }
    Ok(PathBuf::from(path))
}

/// Parse the download URL lifetime from an optional value in seconds.
///
/// If `value` is `None` or empty/whitespace, returns the default of one hour.
pub fn ttl_from_env_value(value: Option<String>) -> RxResult<Duration> {
    let Some(value) = non_empty(value) else {
        return Ok(Duration::from_secs(DEFAULT_DOWNLOAD_URL_TTL_SECS));
    };

    let secs: u64 = value.parse().map_err(|_| {
        RxError::InvalidConfig(format!(
            "RX_DOWNLOAD_URL_TTL_SECS must be a whole number of seconds, got '{}'",
            value
        ))
    })?;
    validate_ttl_secs(secs)?;
    Ok(Duration::from_secs(secs))
}

/// Resolve the blob backend from `RX_BLOB_BACKEND` and its backend-specific variables.
///
/// # Environment Variables
/// - `RX_BLOB_BACKEND`: `local` (default) or `s3`
/// - local: `RX_BLOB_DIR` (default `blob_data`), `RX_PUBLIC_BASE_URL`
///   (default `http://localhost:3000`), `RX_BLOB_SIGNING_KEY` (required)
/// - s3: `S3_ENDPOINT` (default `https://s3.amazonaws.com`), `S3_REGION` (default `us-east-1`),
///   `S3_BUCKET`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY` (all required), `S3_PATH_STYLE`
pub fn blob_backend_from_env(lookup: impl Fn(&str) -> Option<String>) -> RxResult<BlobBackend> {
    let backend = non_empty(lookup("RX_BLOB_BACKEND"))
        .map(|b| b.to_ascii_lowercase())
        .unwrap_or_else(|| "local".into());

    let required = |name: &str| {
        non_empty(lookup(name))
            .ok_or_else(|| RxError::InvalidConfig(format!("{} must be set", name)))
    };

    match backend.as_str() {
        "local" => Ok(BlobBackend::Local {
            root: PathBuf::from(
                non_empty(lookup("RX_BLOB_DIR")).unwrap_or_else(|| DEFAULT_BLOB_DIR.into()),
            ),
            public_base_url: non_empty(lookup("RX_PUBLIC_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.into()),
            signing_key: required("RX_BLOB_SIGNING_KEY")?.into_bytes(),
        }),
        "s3" => Ok(BlobBackend::S3(S3Config {
            endpoint: non_empty(lookup("S3_ENDPOINT"))
                .unwrap_or_else(|| "https://s3.amazonaws.com".into()),
            region: non_empty(lookup("S3_REGION")).unwrap_or_else(|| "us-east-1".into()),
            bucket: required("S3_BUCKET")?,
            access_key_id: required("S3_ACCESS_KEY_ID")?,
            secret_access_key: required("S3_SECRET_ACCESS_KEY")?,
            path_style: non_empty(lookup("S3_PATH_STYLE"))
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })),
        other => Err(RxError::InvalidConfig(format!(
            "RX_BLOB_BACKEND must be 'local' or 's3', got '{}'",
            other
        ))),
    }
}

/// Opens the blob store described by `backend`.
///
/// The S3 store blocks on its own tokio runtime, so async callers should build and use it on a blocking
/// thread.
pub fn open_blob_store(backend: &BlobBackend) -> RxResult<Arc<dyn BlobStore>> {
    match backend {
        BlobBackend::Local {
            root,
            public_base_url,
            signing_key,
        } => Ok(Arc::new(LocalBlobStore::new(
            root,
            public_base_url.clone(),
            signing_key.clone(),
        )?)),
        BlobBackend::S3(cfg) => Ok(Arc::new(S3BlobStore::new(cfg.clone())?)),
    }
}
