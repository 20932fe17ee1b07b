use crate::{blocking, ApiError, AppState, CurrentDoctor};
use api_shared::{
    CreatePatientReq, ErrorRes, PatientDetailRes, PatientPageRes, PatientRes,
    PrescriptionSummaryRes, StarRes,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct PatientListQuery {
    /// Substring of name, patient id or phone
    pub search: Option<String>,

    /// Only starred patients
    pub starred: bool,

    /// 1-based page number
    pub page: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/patients",
    params(PatientListQuery),
    responses(
        (status = 200, description = "One page of patients", body = PatientPageRes),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
/// Lists patients, newest first, optionally filtered by a search term or the starred flag.
#[axum::debug_handler(state = AppState)]
pub async fn list_patients(
    State(state): State<AppState>,
    CurrentDoctor(_doctor): CurrentDoctor,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<PatientPageRes>, ApiError> {
    let patients = state.services.patients.clone();
    let page = blocking(move || {
        Ok(patients.search(
            query.search.as_deref(),
            query.starred,
            query.page.unwrap_or(1),
        )?)
    })
    .await?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient created", body = PatientRes),
        (status = 400, description = "Invalid patient fields", body = ErrorRes),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
/// Creates a standalone patient with a generated `PT` identifier.
#[axum::debug_handler(state = AppState)]
pub async fn create_patient(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
    Json(req): Json<CreatePatientReq>,
) -> Result<(StatusCode, Json<PatientRes>), ApiError> {
    let patients = state.services.patients.clone();
    let patient = blocking(move || Ok(patients.create(req.into())?)).await?;
    tracing::info!("doctor {} created patient {}", doctor.id, patient.patient_id);
    Ok((StatusCode::CREATED, Json(patient.into())))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "External patient identifier")),
    responses(
        (status = 200, description = "Patient with their prescriptions", body = PatientDetailRes),
        (status = 404, description = "Unknown patient", body = ErrorRes)
    )
)]
/// A patient and their prescriptions from every doctor, newest first.
#[axum::debug_handler(state = AppState)]
pub async fn get_patient(
    State(state): State<AppState>,
    CurrentDoctor(_doctor): CurrentDoctor,
    Path(patient_id): Path<String>,
) -> Result<Json<PatientDetailRes>, ApiError> {
    let services = state.services.clone();
    let (patient, prescriptions) = blocking(move || {
        let patient = services.patients.get(&patient_id)?;
        let prescriptions = services.prescriptions.for_patient(patient.id)?;
        Ok((patient, prescriptions))
    })
    .await?;

    Ok(Json(PatientDetailRes {
        patient: patient.into(),
        prescriptions: prescriptions
            .into_iter()
            .map(PrescriptionSummaryRes::from)
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{patient_id}/star",
    params(("patient_id" = String, Path, description = "External patient identifier")),
    responses(
        (status = 200, description = "New starred state", body = StarRes),
        (status = 404, description = "Unknown patient", body = ErrorRes)
    )
)]
/// Flips a patient's starred flag.
#[axum::debug_handler(state = AppState)]
pub async fn toggle_star(
    State(state): State<AppState>,
    CurrentDoctor(_doctor): CurrentDoctor,
    Path(patient_id): Path<String>,
) -> Result<Json<StarRes>, ApiError> {
    let patients = state.services.patients.clone();
    let is_starred = blocking(move || Ok(patients.toggle_star(&patient_id)?)).await?;
    Ok(Json(StarRes { is_starred }))
}
