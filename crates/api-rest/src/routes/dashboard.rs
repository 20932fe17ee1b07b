use crate::{blocking, ApiError, AppState, CurrentDoctor};
use api_shared::DashboardRes;
use axum::extract::State;
use axum::response::Json;

#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard figures for the current doctor", body = DashboardRes),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
/// Practice-wide patient counts and the current doctor's prescription activity.
#[axum::debug_handler(state = AppState)]
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
) -> Result<Json<DashboardRes>, ApiError> {
    let service = state.services.dashboard.clone();
    let doctor_id = doctor.id;
    let stats = blocking(move || Ok(service.stats(doctor_id)?)).await?;
    Ok(Json(DashboardRes::new(doctor, stats)))
}
