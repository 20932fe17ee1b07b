use crate::{blocking, ApiError, AppState, CurrentDoctor};
use api_shared::{
    CreatePrescriptionReq, CreatePrescriptionRes, ErrorRes, GeneratePdfReq, PrescriptionPageRes,
    PrescriptionRes, PrescriptionSummaryRes,
};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use chrono::{Duration, Local, Utc};
use rxpad_core::constants::RARE_CASE_WINDOW_DAYS;
use rxpad_core::{artifact_filename, ClinicalFields, PatientSelector, RenderOptions, RxError};
use serde::Deserialize;
use utoipa::IntoParams;

/// Response header reporting what happened to the archival copy of a generated PDF.
pub const ARCHIVE_STATUS_HEADER: &str = "x-archive-status";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<u32>,
}

fn selector(req: &mut CreatePrescriptionReq) -> Result<PatientSelector, RxError> {
    if let Some(id) = req.patient_id.take().filter(|id| !id.trim().is_empty()) {
        return Ok(PatientSelector::Existing(id.trim().to_string()));
    }
    req.patient_info
        .take()
        .map(|info| PatientSelector::Inline(info.into()))
        .ok_or_else(|| RxError::validation("patient_info", "patient_id or patient_info is required"))
}

#[utoipa::path(
    post,
    path = "/prescriptions",
    request_body = CreatePrescriptionReq,
    responses(
        (status = 201, description = "Prescription saved", body = CreatePrescriptionRes),
        (status = 400, description = "Invalid fields; nothing was saved", body = ErrorRes),
        (status = 404, description = "Referenced patient does not exist", body = ErrorRes),
        (status = 409, description = "Identifier collision; nothing was saved", body = ErrorRes)
    )
)]
/// Saves a finalized prescription, creating its patient in the same transaction when
/// `patient_info` is given instead of `patient_id`.
#[axum::debug_handler(state = AppState)]
pub async fn create_prescription(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
    Json(mut req): Json<CreatePrescriptionReq>,
) -> Result<(StatusCode, Json<CreatePrescriptionRes>), ApiError> {
    let patient = selector(&mut req)?;
    let fields = ClinicalFields {
        chief_complaint: req.chief_complaint,
        diagnosis: req.diagnosis,
        notes: req.notes,
        medications: req.medications,
        canvas_pages: req.canvas_pages,
        signature_data: req.signature_data,
        is_rare_case: req.is_rare_case,
        follow_up_date: req.follow_up_date,
    };

    let prescriptions = state.services.prescriptions.clone();
    let rx = blocking(move || Ok(prescriptions.create(doctor.id, patient, fields)?)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePrescriptionRes {
            success: true,
            prescription_id: rx.prescription_id.to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/prescriptions",
    params(PageQuery),
    responses(
        (status = 200, description = "The current doctor's prescriptions, newest first", body = PrescriptionPageRes)
    )
)]
#[axum::debug_handler(state = AppState)]
pub async fn prescription_history(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
    Query(query): Query<PageQuery>,
) -> Result<Json<PrescriptionPageRes>, ApiError> {
    let prescriptions = state.services.prescriptions.clone();
    let page = blocking(move || Ok(prescriptions.history(doctor.id, query.page.unwrap_or(1))?)).await?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    get,
    path = "/prescriptions/rare",
    responses(
        (status = 200, description = "Rare-case prescriptions from the last 30 days", body = [PrescriptionSummaryRes])
    )
)]
#[axum::debug_handler(state = AppState)]
pub async fn rare_cases(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
) -> Result<Json<Vec<PrescriptionSummaryRes>>, ApiError> {
    let since = Utc::now() - Duration::days(RARE_CASE_WINDOW_DAYS);
    let prescriptions = state.services.prescriptions.clone();
    let rows = blocking(move || Ok(prescriptions.rare_cases(doctor.id, since)?)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/prescriptions/{prescription_id}",
    params(("prescription_id" = String, Path, description = "External prescription identifier")),
    responses(
        (status = 200, description = "Prescription with its patient", body = PrescriptionRes),
        (status = 404, description = "Unknown prescription or authored by another doctor", body = ErrorRes)
    )
)]
#[axum::debug_handler(state = AppState)]
pub async fn get_prescription(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
    Path(prescription_id): Path<String>,
) -> Result<Json<PrescriptionRes>, ApiError> {
    let services = state.services.clone();
    let res = blocking(move || {
        let rx = services.prescriptions.get_for_doctor(&prescription_id, doctor.id)?;
        let patient = services.patients.get_by_internal_id(rx.patient_id)?;
        Ok(PrescriptionRes::new(rx, patient))
    })
    .await?;
    Ok(Json(res))
}

#[utoipa::path(
    post,
    path = "/prescriptions/pdf",
    request_body = GeneratePdfReq,
    responses(
        (status = 200, description = "Rendered PDF as an attachment; x-archive-status reports archived, failed or skipped", content_type = "application/pdf"),
        (status = 400, description = "Empty HTML", body = ErrorRes),
        (status = 502, description = "Renderer failed", body = ErrorRes)
    )
)]
/// Renders HTML to PDF and returns it for immediate download.
///
/// When `prescription_id` names one of the current doctor's prescriptions, the PDF is also
/// archived against it. Archival problems never fail the request: the bytes are returned and
/// the outcome is reported in the `x-archive-status` header.
#[axum::debug_handler(state = AppState)]
pub async fn generate_pdf(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
    Json(req): Json<GeneratePdfReq>,
) -> Result<Response, ApiError> {
    if req.html_content.trim().is_empty() {
        return Err(RxError::validation("html_content", "HTML content is required").into());
    }

    let services = state.services.clone();
    let (pdf, archive_status) = blocking(move || {
        let pdf = services
            .renderer
            .render(&req.html_content, &RenderOptions::default())
            .map_err(RxError::from)?;

        let Some(prescription_id) = req.prescription_id.filter(|id| !id.trim().is_empty()) else {
            return Ok((pdf, "skipped"));
        };
        let rx = match services.prescriptions.get_for_doctor(&prescription_id, doctor.id) {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!("not archiving PDF for {}: {}", prescription_id, e);
                return Ok((pdf, "skipped"));
            }
        };

        let filename = artifact_filename(&rx.prescription_id);
        let status = match services
            .archiver
            .archive(&pdf, &filename, rx.prescription_id.as_str())
        {
            Ok(_) => "archived",
            Err(e) => {
                tracing::error!("archiving PDF for {} failed: {}", rx.prescription_id, e);
                "failed"
            }
        };
        Ok((pdf, status))
    })
    .await?;

    let download_name = format!(
        "attachment; filename=\"prescription_{}.pdf\"",
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let disposition = HeaderValue::from_str(&download_name)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::HeaderName::from_static(ARCHIVE_STATUS_HEADER),
                HeaderValue::from_static(archive_status),
            ),
        ],
        pdf,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/prescriptions/{prescription_id}/pdf",
    params(("prescription_id" = String, Path, description = "External prescription identifier")),
    responses(
        (status = 307, description = "Redirect to a time-limited download URL"),
        (status = 404, description = "Unknown prescription or no archived PDF", body = ErrorRes)
    )
)]
/// Redirects to a freshly signed download URL for the prescription's archived PDF.
#[axum::debug_handler(state = AppState)]
pub async fn download_pdf(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
    Path(prescription_id): Path<String>,
) -> Result<Redirect, ApiError> {
    let retrieval = state.services.retrieval.clone();
    let ttl = state.services.download_url_ttl();
    let lookup_id = prescription_id.clone();
    let url = blocking(move || Ok(retrieval.download_url_for(&lookup_id, doctor.id, ttl)?)).await?;

    match url {
        Some(url) => Ok(Redirect::temporary(&url)),
        None => Err(RxError::not_found("prescription PDF", prescription_id).into()),
    }
}
