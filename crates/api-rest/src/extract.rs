//! Authenticated-doctor extractor.

use crate::{blocking, ApiError, AppState};
use api_shared::auth::API_KEY_HEADER;
use api_shared::{principal_from_lookup, validate_api_key};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rxpad_core::Doctor;

/// The doctor making the request.
///
/// Extraction checks `x-api-key`, reads the forwarded principal and resolves it to a doctor,
/// registering them on first sight.
#[derive(Clone, Debug)]
pub struct CurrentDoctor(pub Doctor);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentDoctor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        validate_api_key(&state.api_key, header(API_KEY_HEADER).as_deref())?;
        let principal = principal_from_lookup(header)?;

        let doctors = state.services.doctors.clone();
        let doctor = blocking(move || Ok(doctors.resolve_or_register(&principal)?)).await?;
        Ok(CurrentDoctor(doctor))
    }
}
