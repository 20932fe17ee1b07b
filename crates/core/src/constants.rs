//! Constants used throughout the RxPad core crate.
//!
//! Storage-key and filename conventions live here so the archiver, the reconciler and the CLI
//! agree on them.

/// Default SQLite database file when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_PATH: &str = "prescription_system.db";

/// Default directory for the local blob store.
pub const DEFAULT_BLOB_DIR: &str = "blob_data";

/// Default public origin used to build local download URLs.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Default renderer binary, resolved through `PATH`.
pub const DEFAULT_WKHTMLTOPDF_PATH: &str = "wkhtmltopdf";

/// Default lifetime of download URLs, in seconds.
pub const DEFAULT_DOWNLOAD_URL_TTL_SECS: u64 = 3600;

/// Top-level blob namespace for prescription PDFs.
pub const PRESCRIPTIONS_PREFIX: &str = "prescriptions";

/// Top-level blob namespace for hospital logos.
pub const HOSPITAL_LOGOS_PREFIX: &str = "hospital_logos";

/// Content type recorded for archived prescriptions.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Rows per page for patient search and prescription history.
pub const PAGE_SIZE: u32 = 20;

/// Rows shown in each of the dashboard's recent lists.
pub const DASHBOARD_RECENT_LIMIT: u32 = 5;

/// Look-back window for the rare-case listing.
pub const RARE_CASE_WINDOW_DAYS: i64 = 30;

/// Image extensions accepted for hospital logos.
pub const ALLOWED_LOGO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
