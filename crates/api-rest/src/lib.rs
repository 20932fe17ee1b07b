//! # API REST
//!
//! REST API implementation for RxPad.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, redirects to signed URLs)
//!
//! Uses `api-shared` for request/response bodies and authentication. Every core call is
//! blocking and runs on tokio's blocking pool.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
pub mod routes;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use rxpad_core::config::BlobBackend;
use rxpad_core::{CoreConfig, CoreServices, Database, RxResult, WkhtmltopdfRenderer};
use rxpad_files::{BlobStore, LocalBlobStore, S3BlobStore};
use rxpad_ident::RandomIdentifiers;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;
pub use extract::CurrentDoctor;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: CoreServices,

    /// Shared secret expected in `x-api-key`
    pub api_key: Arc<str>,

    /// Present when blobs live on the local filesystem and are served by `/blobs`
    pub local_blobs: Option<Arc<LocalBlobStore>>,
}

impl AppState {
    /// Opens the database and blob store described by `cfg`.
    ///
    /// Blocking; the S3 backend starts its own runtime and waits on it, so call this from
    /// `spawn_blocking` when already inside a runtime.
    pub fn open(cfg: &CoreConfig, api_key: impl Into<Arc<str>>) -> RxResult<Self> {
        let db = Database::open(cfg.database_path())?;

        let (blobs, local_blobs) = match cfg.blob_backend() {
            BlobBackend::Local {
                root,
                public_base_url,
                signing_key,
            } => {
                let local = Arc::new(LocalBlobStore::new(
                    root,
                    public_base_url.clone(),
                    signing_key.clone(),
                )?);
                let blobs: Arc<dyn BlobStore> = local.clone();
                (blobs, Some(local))
            }
            BlobBackend::S3(s3) => {
                let blobs: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(s3.clone())?);
                (blobs, None)
            }
        };

        let services = CoreServices::new(
            db,
            blobs,
            Arc::new(WkhtmltopdfRenderer::new(cfg.wkhtmltopdf_path())),
            Arc::new(RandomIdentifiers),
            cfg.download_url_ttl(),
        );

        Ok(Self {
            services,
            api_key: api_key.into(),
            local_blobs,
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::dashboard::dashboard,
        routes::profile::get_profile,
        routes::profile::update_profile,
        routes::profile::upload_logo,
        routes::profile::get_logo,
        routes::patients::list_patients,
        routes::patients::create_patient,
        routes::patients::get_patient,
        routes::patients::toggle_star,
        routes::prescriptions::create_prescription,
        routes::prescriptions::prescription_history,
        routes::prescriptions::rare_cases,
        routes::prescriptions::get_prescription,
        routes::prescriptions::generate_pdf,
        routes::prescriptions::download_pdf,
        routes::blobs::download_blob,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::ErrorRes,
        api_shared::PatientRes,
        api_shared::CreatePatientReq,
        api_shared::PatientPageRes,
        api_shared::PatientDetailRes,
        api_shared::StarRes,
        api_shared::CreatePrescriptionReq,
        api_shared::CreatePrescriptionRes,
        api_shared::PrescriptionRes,
        api_shared::PrescriptionSummaryRes,
        api_shared::PrescriptionPageRes,
        api_shared::GeneratePdfReq,
        api_shared::DoctorRes,
        api_shared::ProfileRes,
        api_shared::UpdateProfileReq,
        api_shared::DashboardRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full router, including Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route(
            "/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .route(
            "/profile/logo",
            get(routes::profile::get_logo)
                .put(routes::profile::upload_logo)
                .layer(DefaultBodyLimit::max(routes::profile::LOGO_BODY_LIMIT)),
        )
        .route(
            "/patients",
            get(routes::patients::list_patients).post(routes::patients::create_patient),
        )
        .route("/patients/:patient_id", get(routes::patients::get_patient))
        .route("/patients/:patient_id/star", post(routes::patients::toggle_star))
        .route(
            "/prescriptions",
            get(routes::prescriptions::prescription_history)
                .post(routes::prescriptions::create_prescription),
        )
        .route("/prescriptions/rare", get(routes::prescriptions::rare_cases))
        .route("/prescriptions/pdf", post(routes::prescriptions::generate_pdf))
        .route(
            "/prescriptions/:prescription_id",
            get(routes::prescriptions::get_prescription),
        )
        .route(
            "/prescriptions/:prescription_id/pdf",
            get(routes::prescriptions::download_pdf),
        )
        .route("/blobs/*key", get(routes::blobs::download_blob))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs `f` on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
}

#[cfg(test)]
pub(crate) mod test_support;
