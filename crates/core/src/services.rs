//! Wiring of the core stores and services over one database and one blob store.

use crate::artifacts::{ArchiveReconciler, ArtifactArchiver, RetrievalGateway};
use crate::config::{open_blob_store, CoreConfig};
use crate::dashboard::DashboardService;
use crate::db::Database;
use crate::logos::HospitalLogos;
use crate::render::{DocumentRenderer, WkhtmltopdfRenderer};
use crate::repositories::doctors::DoctorStore;
use crate::repositories::patients::PatientStore;
use crate::repositories::prescriptions::PrescriptionStore;
use crate::RxResult;
use rxpad_files::BlobStore;
use rxpad_ident::{IdentifierSource, RandomIdentifiers};
use std::sync::Arc;
use std::time::Duration;

/// Every core service, sharing a database handle, blob store and renderer.
///
/// Cloning is cheap; all members are reference-counted handles.
#[derive(Clone)]
pub struct CoreServices {
    pub patients: PatientStore,
    pub prescriptions: PrescriptionStore,
    pub doctors: DoctorStore,
    pub dashboard: DashboardService,
    pub archiver: ArtifactArchiver,
    pub retrieval: RetrievalGateway,
    pub reconciler: ArchiveReconciler,
    pub logos: HospitalLogos,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub blobs: Arc<dyn BlobStore>,
    download_url_ttl: Duration,
}

impl CoreServices {
    /// Assembles the services from already-opened parts.
    pub fn new(
        db: Database,
        blobs: Arc<dyn BlobStore>,
        renderer: Arc<dyn DocumentRenderer>,
        ids: Arc<dyn IdentifierSource>,
        download_url_ttl: Duration,
    ) -> Self {
        let patients = PatientStore::new(db.clone(), ids.clone());
        let prescriptions = PrescriptionStore::new(db.clone(), ids);
        let doctors = DoctorStore::new(db);

        Self {
            dashboard: DashboardService::new(patients.clone(), prescriptions.clone()),
            archiver: ArtifactArchiver::new(blobs.clone(), prescriptions.clone()),
            retrieval: RetrievalGateway::new(blobs.clone(), prescriptions.clone()),
            reconciler: ArchiveReconciler::new(blobs.clone(), prescriptions.clone()),
            logos: HospitalLogos::new(blobs.clone(), doctors.clone()),
            patients,
            prescriptions,
            doctors,
            renderer,
            blobs,
            download_url_ttl,
        }
    }

    /// Opens the database and blob store described by `cfg`, with random identifiers and the
    /// `wkhtmltopdf` renderer.
    ///
    /// S3 backends block on their own runtime, so call it outside an async runtime or
    /// from a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns `RxError` if the database cannot be opened or migrated, or the blob store
    /// cannot be initialised.
    pub fn open(cfg: &CoreConfig) -> RxResult<Self> {
        let db = Database::open(cfg.database_path())?;
        let blobs = open_blob_store(cfg.blob_backend())?;
        let renderer = Arc::new(WkhtmltopdfRenderer::new(cfg.wkhtmltopdf_path()));

        tracing::info!(
            "core services ready (database: {}, blobs: {:?})",
            cfg.database_path().display(),
            cfg.blob_backend()
        );
        Ok(Self::new(
            db,
            blobs,
            renderer,
            Arc::new(RandomIdentifiers),
            cfg.download_url_ttl(),
        ))
    }

    /// Lifetime of download URLs minted by the retrieval gateway.
    pub fn download_url_ttl(&self) -> Duration {
        self.download_url_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlobBackend;
    use crate::models::{ClinicalFields, NewPatient, PatientSelector, Principal};
    use crate::render::RenderOptions;
    use crate::testing::FakeRenderer;
    use chrono::Utc;
    use rxpad_files::LocalBlobStore;
    use tempfile::TempDir;

    #[test]
    fn test_render_archive_and_retrieve() {
        let dir = TempDir::new().unwrap();
        let blobs = Arc::new(
            LocalBlobStore::new(&dir.path().join("blobs"), "http://localhost:3000", b"k".to_vec())
                .unwrap(),
        );
        let services = CoreServices::new(
            Database::open_in_memory().unwrap(),
            blobs.clone(),
            Arc::new(FakeRenderer),
            Arc::new(RandomIdentifiers),
            Duration::from_secs(3600),
        );
        let doctor = services
            .doctors
            .resolve_or_register(&Principal {
                email: "ada@example.com".into(),
                name: "Ada".into(),
                provider: None,
                provider_id: None,
                picture: None,
            })
            .unwrap();
        let rx = services
            .prescriptions
            .create(
                doctor.id,
                PatientSelector::Inline(NewPatient {
                    name: "Alice Johnson".into(),
                    ..Default::default()
                }),
                ClinicalFields::default(),
            )
            .unwrap();

        let pdf = services
            .renderer
            .render("<h1>Rx</h1>", &RenderOptions::default())
            .unwrap();
        services
            .archiver
            .archive(
                &pdf,
                &crate::artifacts::artifact_filename(&rx.prescription_id),
                rx.prescription_id.as_str(),
            )
            .unwrap();

        let url = services
            .retrieval
            .download_url_for(rx.prescription_id.as_str(), doctor.id, services.download_url_ttl())
            .unwrap()
            .unwrap();
        assert_eq!(blobs.open_signed_url(&url, Utc::now()).unwrap(), pdf);
        assert!(services.reconciler.sweep().unwrap().is_clean());
    }

    #[test]
    fn test_open_from_config() {
        let dir = TempDir::new().unwrap();
        let cfg = CoreConfig::new(
            dir.path().join("rx.db"),
            BlobBackend::Local {
                root: dir.path().join("blobs"),
                public_base_url: "http://localhost:3000".into(),
                signing_key: b"secret".to_vec(),
            },
            "wkhtmltopdf".into(),
            Duration::from_secs(60),
        )
        .unwrap();

        let services = CoreServices::open(&cfg).unwrap();

        assert_eq!(services.download_url_ttl(), Duration::from_secs(60));
        assert_eq!(services.patients.count().unwrap(), 0);
        assert!(dir.path().join("rx.db").exists());
    }
}
