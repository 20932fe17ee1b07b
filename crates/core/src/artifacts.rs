//! Artifact archival, retrieval and reconciliation.
//!
//! ## Storage Layout
//!
//! ```text
//! prescriptions/
//!   <prescription_id>/
//!     prescription_<prescription_id>.pdf
//! ```
//!
//! The key is derived only from the prescription identifier and filename, so retrying an
//! archival overwrites the same object instead of creating a duplicate.
//!
//! ## Consistency
//!
//! Upload and metadata write are not transactional. If the record update fails after a
//! successful upload, the blob is orphaned; [`ArtifactArchiver::archive`] logs the key and
//! [`ArchiveReconciler::sweep`] reports it later. Recorded paths whose blob has disappeared are
//! reported as missing.

use crate::constants::{PDF_CONTENT_TYPE, PRESCRIPTIONS_PREFIX};
use crate::repositories::prescriptions::PrescriptionStore;
use crate::{RxError, RxResult};
use rxpad_files::{BlobError, BlobKey, BlobStore};
use rxpad_ident::{ExternalId, IdPrefix};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid artifact filename '{0}'")]
    InvalidFilename(String),

    #[error("prescription not found: {0}")]
    NotFound(String),

    /// The upload failed; the prescription record is unchanged
    #[error("upload failed: {0}")]
    Upload(#[from] BlobError),

    /// The upload succeeded but the record could not be updated; the blob is orphaned
    #[error("uploaded {path} but failed to record it: {source}")]
    Metadata {
        path: String,
        #[source]
        source: Box<RxError>,
    },

    #[error("failed to look up prescription: {0}")]
    Lookup(#[source] Box<RxError>),
}

/// Where an artifact was archived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArchivedArtifact {
    /// Storage path recorded on the prescription
    pub path: String,

    /// Canonical object URL; not readable without signing
    pub url: String,
}

/// Conventional artifact filename: `prescription_<prescription_id>.pdf`.
pub fn artifact_filename(prescription_id: &ExternalId) -> String {
    format!("prescription_{}.pdf", prescription_id)
}

/// Builds `prescriptions/<prescription_id>/<filename>`.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidFilename`] if `filename` is empty, contains a path separator
/// or `..`, or uses characters a storage key cannot hold.
pub fn artifact_key(prescription_id: &ExternalId, filename: &str) -> Result<BlobKey, ArchiveError> {
    if filename.trim().is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(ArchiveError::InvalidFilename(filename.to_string()));
    }

    BlobKey::from_segments(&[PRESCRIPTIONS_PREFIX, prescription_id.as_str(), filename])
        .map_err(|_| ArchiveError::InvalidFilename(filename.to_string()))
}

/// Uploads rendered PDFs and links them to their prescription.
#[derive(Clone)]
pub struct ArtifactArchiver {
    blobs: Arc<dyn BlobStore>,
    prescriptions: PrescriptionStore,
}

impl ArtifactArchiver {
    pub fn new(blobs: Arc<dyn BlobStore>, prescriptions: PrescriptionStore) -> Self {
        Self {
            blobs,
            prescriptions,
        }
    }

    /// Archives `pdf_bytes` for `prescription_id` and records the path on the prescription.
    ///
    /// # Arguments
    ///
    /// * `pdf_bytes` - Rendered document
    /// * `filename` - Object filename, normally [`artifact_filename`]
    /// * `prescription_id` - External identifier of an existing prescription
    ///
    /// # Returns
    ///
    /// The storage path and canonical URL. Calling again with the same identifier and filename
    /// yields the same path and replaces the stored object.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError` if:
    /// - the filename is unusable ([`ArchiveError::InvalidFilename`])
    /// - the prescription does not exist ([`ArchiveError::NotFound`]); nothing is uploaded
    /// - the upload fails ([`ArchiveError::Upload`]); the record is untouched
    /// - the record update fails after upload ([`ArchiveError::Metadata`]); the blob is orphaned
    pub fn archive(
        &self,
        pdf_bytes: &[u8],
        filename: &str,
        prescription_id: &str,
    ) -> Result<ArchivedArtifact, ArchiveError> {
        let rx_id = ExternalId::parse(IdPrefix::Prescription, prescription_id)
            .map_err(|_| ArchiveError::NotFound(prescription_id.to_string()))?;
        let key = artifact_key(&rx_id, filename)?;

        match self.prescriptions.get(rx_id.as_str()) {
            Ok(_) => {}
            Err(RxError::NotFound { .. }) => {
                return Err(ArchiveError::NotFound(prescription_id.to_string()))
            }
            Err(e) => return Err(ArchiveError::Lookup(Box::new(e))),
        }

        let uploaded = self
            .blobs
            .upload(pdf_bytes, &key, Some(PDF_CONTENT_TYPE))
            .inspect_err(|e| tracing::warn!("archive upload for {} failed: {}", rx_id, e))?;

        if let Err(e) = self
            .prescriptions
            .attach_artifact(rx_id.as_str(), &uploaded.path, filename)
        {
            tracing::error!(
                "orphaned artifact {}: uploaded but not recorded on {}: {}",
                uploaded.path,
                rx_id,
                e
            );
            return Err(ArchiveError::Metadata {
                path: uploaded.path,
                source: Box::new(e),
            });
        }

        tracing::info!("archived {} ({} bytes)", uploaded.path, pdf_bytes.len());
        Ok(ArchivedArtifact {
            path: uploaded.path,
            url: uploaded.secure_url,
        })
    }
}

/// Signs `storage_path` if an object exists under it; any failure is logged and yields `None`.
pub(crate) fn sign_existing(blobs: &dyn BlobStore, storage_path: &str, ttl: Duration) -> Option<String> {
    let key = match BlobKey::new(storage_path) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!("cannot sign unaddressable path {}: {}", storage_path, e);
            return None;
        }
    };

    match blobs.exists(&key) {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!("no object stored at {}", key);
            return None;
        }
        Err(e) => {
            tracing::warn!("existence check for {} failed: {}", key, e);
            return None;
        }
    }

    blobs
        .signed_url(&key, ttl)
        .inspect_err(|e| tracing::warn!("signing {} failed: {}", key, e))
        .ok()
}

/// Exchanges stored artifact paths for time-limited download URLs.
#[derive(Clone)]
pub struct RetrievalGateway {
    blobs: Arc<dyn BlobStore>,
    prescriptions: PrescriptionStore,
}

impl RetrievalGateway {
    pub fn new(blobs: Arc<dyn BlobStore>, prescriptions: PrescriptionStore) -> Self {
        Self {
            blobs,
            prescriptions,
        }
    }

    /// Mints a signed URL for `storage_path`, valid for `ttl`.
    ///
    /// Returns `None` rather than an error when the path is not a valid key, no object exists
    /// under it, or signing fails. Every call mints a fresh URL.
    pub fn get_download_url(&self, storage_path: &str, ttl: Duration) -> Option<String> {
        sign_existing(self.blobs.as_ref(), storage_path, ttl)
    }

    /// Resolves a doctor's prescription and mints a download URL for its artifact.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the prescription has not been archived or its artifact is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`RxError::NotFound`] if the prescription does not exist or belongs to another
    /// doctor.
    pub fn download_url_for(
        &self,
        prescription_id: &str,
        doctor_id: i64,
        ttl: Duration,
    ) -> RxResult<Option<String>> {
        let rx = self.prescriptions.get_for_doctor(prescription_id, doctor_id)?;
        Ok(rx
            .pdf_cloud_path
            .as_deref()
            .and_then(|path| self.get_download_url(path, ttl)))
    }
}

/// Outcome of comparing blob storage with recorded artifact paths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Recorded paths whose blob exists
    pub referenced: usize,

    /// Blobs under `prescriptions/` with no prescription pointing at them
    pub orphaned: Vec<String>,

    /// Recorded paths with no blob behind them
    pub missing: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.missing.is_empty()
    }
}

/// Read-only sweep that detects orphaned and missing artifacts.
#[derive(Clone)]
pub struct ArchiveReconciler {
    blobs: Arc<dyn BlobStore>,
    prescriptions: PrescriptionStore,
}

impl ArchiveReconciler {
    pub fn new(blobs: Arc<dyn BlobStore>, prescriptions: PrescriptionStore) -> Self {
        Self {
            blobs,
            prescriptions,
        }
    }

    pub fn sweep(&self) -> RxResult<ReconcileReport> {
        let stored: BTreeSet<String> = self
            .blobs
            .list(&format!("{}/", PRESCRIPTIONS_PREFIX))?
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        let recorded: BTreeSet<String> =
            self.prescriptions.list_archived_paths()?.into_iter().collect();

        let report = ReconcileReport {
            referenced: recorded.intersection(&stored).count(),
            orphaned: stored.difference(&recorded).cloned().collect(),
            missing: recorded.difference(&stored).cloned().collect(),
        };

        for path in &report.orphaned {
            tracing::warn!("orphaned artifact: {}", path);
        }
        for path in &report.missing {
            tracing::warn!("recorded artifact missing from storage: {}", path);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ClinicalFields, NewPatient, PatientSelector, Prescription};
    use crate::testing::{register_doctor, FailingUploads, FixedIdentifiers};
    use chrono::Utc;
    use rxpad_files::LocalBlobStore;
    use rxpad_ident::IdentifierSource;
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj<<>>endobj\n%%EOF\n";
    const RX_ID: &str = "RX20250101ABCD1234";

    struct Fixture {
        _dir: TempDir,
        blobs: Arc<LocalBlobStore>,
        db: Database,
        doctor_id: i64,
        prescriptions: PrescriptionStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let blobs = Arc::new(
                LocalBlobStore::new(dir.path(), "http://localhost:3000", b"k".to_vec()).unwrap(),
            );
            let db = Database::open_in_memory().unwrap();
            let doctor_id = register_doctor(&db, "ada@example.com");
            let rx_id = ExternalId::parse(IdPrefix::Prescription, RX_ID).unwrap();
            let ids: Arc<dyn IdentifierSource> = Arc::new(FixedIdentifiers::new(vec![rx_id]));
            let prescriptions = PrescriptionStore::new(db.clone(), ids);
            Self {
                _dir: dir,
                blobs,
                db,
                doctor_id,
                prescriptions,
            }
        }

        fn create(&self) -> Prescription {
            self.prescriptions
                .create(
                    self.doctor_id,
                    PatientSelector::Inline(NewPatient {
                        name: "Alice Johnson".into(),
                        ..Default::default()
                    }),
                    ClinicalFields {
                        chief_complaint: "fever".into(),
                        ..Default::default()
                    },
                )
                .unwrap()
        }

        fn archiver(&self) -> ArtifactArchiver {
            ArtifactArchiver::new(self.blobs.clone(), self.prescriptions.clone())
        }

        fn gateway(&self) -> RetrievalGateway {
            RetrievalGateway::new(self.blobs.clone(), self.prescriptions.clone())
        }
    }

    fn rx_id() -> ExternalId {
        ExternalId::parse(IdPrefix::Prescription, RX_ID).unwrap()
    }

    #[test]
    fn test_artifact_filename_convention() {
        assert_eq!(artifact_filename(&rx_id()), "prescription_RX20250101ABCD1234.pdf");
    }

    #[test]
    fn test_artifact_key_rejects_unsafe_filenames() {
        for bad in ["", "  ", "a/b.pdf", "a\\b.pdf", "..", "x..pdf", "with space.pdf"] {
            assert!(
                matches!(artifact_key(&rx_id(), bad), Err(ArchiveError::InvalidFilename(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_archive_records_conventional_path() {
        let f = Fixture::new();
        f.create();

        let archived = f
            .archiver()
            .archive(PDF, "prescription_RX20250101ABCD1234.pdf", RX_ID)
            .unwrap();

        let expected = "prescriptions/RX20250101ABCD1234/prescription_RX20250101ABCD1234.pdf";
        assert_eq!(archived.path, expected);
        assert_eq!(archived.url, format!("http://localhost:3000/blobs/{}", expected));

        let stored = f.prescriptions.get(RX_ID).unwrap();
        assert_eq!(stored.pdf_cloud_path.as_deref(), Some(expected));
        assert_eq!(
            stored.pdf_filename.as_deref(),
            Some("prescription_RX20250101ABCD1234.pdf")
        );

        assert!(f.gateway().get_download_url(expected, Duration::from_secs(3600)).is_some());
    }

    #[test]
    fn test_archive_twice_reuses_key_and_round_trips() {
        let f = Fixture::new();
        f.create();
        let filename = artifact_filename(&rx_id());

        let first = f.archiver().archive(b"draft", &filename, RX_ID).unwrap();
        let second = f.archiver().archive(PDF, &filename, RX_ID).unwrap();
        assert_eq!(first.path, second.path);
        assert_eq!(f.blobs.list("prescriptions/").unwrap().len(), 1);

        let url = f
            .gateway()
            .get_download_url(&second.path, Duration::from_secs(3600))
            .unwrap();
        let fetched = f.blobs.open_signed_url(&url, Utc::now()).unwrap();
        assert_eq!(fetched, PDF);
    }

    #[test]
    fn test_archive_unknown_prescription_uploads_nothing() {
        let f = Fixture::new();

        let err = f
            .archiver()
            .archive(PDF, "prescription_RX20250101ABCD1234.pdf", RX_ID)
            .unwrap_err();

        assert!(matches!(err, ArchiveError::NotFound(_)));
        assert!(f.blobs.list("").unwrap().is_empty());
    }

    #[test]
    fn test_archive_malformed_identifier_is_not_found() {
        let f = Fixture::new();
        assert!(matches!(
            f.archiver().archive(PDF, "x.pdf", "../../etc"),
            Err(ArchiveError::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_upload_leaves_record_untouched() {
        let f = Fixture::new();
        f.create();
        let archiver = ArtifactArchiver::new(Arc::new(FailingUploads), f.prescriptions.clone());

        let err = archiver
            .archive(PDF, "prescription_RX20250101ABCD1234.pdf", RX_ID)
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Upload(_)));
        assert_eq!(f.prescriptions.get(RX_ID).unwrap().pdf_cloud_path, None);

        // A later retry against a working store succeeds.
        f.archiver()
            .archive(PDF, "prescription_RX20250101ABCD1234.pdf", RX_ID)
            .unwrap();
        assert!(f.prescriptions.get(RX_ID).unwrap().pdf_cloud_path.is_some());
    }

    #[test]
    fn test_failed_record_update_orphans_uploaded_blob() {
        let f = Fixture::new();
        f.create();
        f.db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_updates BEFORE UPDATE ON prescriptions
                 BEGIN SELECT RAISE(ABORT, 'prescriptions are read-only'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let err = f
            .archiver()
            .archive(PDF, &artifact_filename(&rx_id()), RX_ID)
            .unwrap_err();

        let expected = "prescriptions/RX20250101ABCD1234/prescription_RX20250101ABCD1234.pdf";
        match err {
            ArchiveError::Metadata { path, source } => {
                assert_eq!(path, expected);
                assert!(matches!(*source, RxError::Database(_)), "{source}");
            }
            other => panic!("expected a metadata failure, got {other:?}"),
        }

        assert_eq!(f.prescriptions.get(RX_ID).unwrap().pdf_cloud_path, None);
        assert!(f.blobs.exists(&BlobKey::new(expected).unwrap()).unwrap());

        let report = ArchiveReconciler::new(f.blobs.clone(), f.prescriptions.clone())
            .sweep()
            .unwrap();
        assert_eq!(report.orphaned, vec![expected.to_string()]);
        assert_eq!(report.referenced, 0);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_get_download_url_for_never_archived_path_is_none() {
        let f = Fixture::new();
        let gateway = f.gateway();
        let ttl = Duration::from_secs(3600);

        assert_eq!(
            gateway.get_download_url("prescriptions/RX20250101ABCD1234/prescription_RX20250101ABCD1234.pdf", ttl),
            None
        );
        assert_eq!(gateway.get_download_url("../outside", ttl), None);
        assert_eq!(gateway.get_download_url("", ttl), None);
    }

    #[test]
    fn test_download_url_for_is_doctor_scoped() {
        let f = Fixture::new();
        f.create();
        let other = register_doctor(&f.db, "grace@example.com");
        let gateway = f.gateway();
        let ttl = Duration::from_secs(60);

        assert_eq!(gateway.download_url_for(RX_ID, f.doctor_id, ttl).unwrap(), None);

        f.archiver()
            .archive(PDF, &artifact_filename(&rx_id()), RX_ID)
            .unwrap();
        assert!(gateway.download_url_for(RX_ID, f.doctor_id, ttl).unwrap().is_some());
        assert!(matches!(
            gateway.download_url_for(RX_ID, other, ttl),
            Err(RxError::NotFound { .. })
        ));
    }

    #[test]
    fn test_reconciler_reports_orphans_and_missing() {
        let f = Fixture::new();
        f.create();
        f.archiver()
            .archive(PDF, &artifact_filename(&rx_id()), RX_ID)
            .unwrap();

        let orphan = BlobKey::new("prescriptions/RX20250101FFFF0000/prescription_RX20250101FFFF0000.pdf")
            .unwrap();
        f.blobs.upload(PDF, &orphan, None).unwrap();
        f.blobs
            .upload(b"logo", &BlobKey::new("hospital_logos/1/logo_1.png").unwrap(), None)
            .unwrap();

        let reconciler = ArchiveReconciler::new(f.blobs.clone(), f.prescriptions.clone());
        let report = reconciler.sweep().unwrap();
        assert_eq!(report.referenced, 1);
        assert_eq!(report.orphaned, vec![orphan.to_string()]);
        assert!(report.missing.is_empty());
        assert!(!report.is_clean());

        let recorded = f.prescriptions.get(RX_ID).unwrap().pdf_cloud_path.unwrap();
        std::fs::remove_file(f.blobs.root().join(&recorded)).unwrap();
        let report = reconciler.sweep().unwrap();
        assert_eq!(report.referenced, 0);
        assert_eq!(report.missing, vec![recorded]);
    }
}
