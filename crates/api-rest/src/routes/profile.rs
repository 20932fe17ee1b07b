use crate::{blocking, ApiError, AppState, CurrentDoctor};
use api_shared::{ErrorRes, ProfileRes, UpdateProfileReq};
use axum::extract::{Multipart, State};
use axum::response::{Json, Redirect};
use rxpad_core::RxError;

/// Upper bound on an uploaded logo, including multipart overhead.
pub const LOGO_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The current doctor's profile", body = ProfileRes),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
#[axum::debug_handler(state = AppState)]
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
) -> Result<Json<ProfileRes>, ApiError> {
    let doctors = state.services.doctors.clone();
    let profile = blocking(move || Ok(doctors.get_profile(doctor.id)?)).await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileReq,
    responses(
        (status = 200, description = "Updated profile", body = ProfileRes),
        (status = 400, description = "Invalid profile fields", body = ErrorRes)
    )
)]
/// Applies a partial profile update; omitted fields keep their current values.
#[axum::debug_handler(state = AppState)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
    Json(req): Json<UpdateProfileReq>,
) -> Result<Json<ProfileRes>, ApiError> {
    let doctors = state.services.doctors.clone();
    let update = req.into();
    let profile = blocking(move || Ok(doctors.update_profile(doctor.id, &update)?)).await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    put,
    path = "/profile/logo",
    request_body(content_type = "multipart/form-data", description = "Image in a `logo` (or `file`) field"),
    responses(
        (status = 200, description = "Logo stored", body = ProfileRes),
        (status = 400, description = "Missing file or unsupported extension", body = ErrorRes)
    )
)]
/// Stores a hospital logo for the current doctor, replacing any previous one.
#[axum::debug_handler(state = AppState)]
pub async fn upload_logo(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
    mut multipart: Multipart,
) -> Result<Json<ProfileRes>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        if !matches!(field.name(), Some("logo" | "file")) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read logo: {}", e)))?;
        upload = Some((filename, bytes.to_vec()));
    }

    let (filename, bytes) =
        upload.ok_or_else(|| RxError::validation("logo", "no logo file in request"))?;

    let logos = state.services.logos.clone();
    let profile = blocking(move || Ok(logos.upload(doctor.id, &filename, &bytes)?)).await?;
    tracing::info!("doctor {} uploaded a hospital logo", doctor.id);
    Ok(Json(profile.into()))
}

#[utoipa::path(
    get,
    path = "/profile/logo",
    responses(
        (status = 307, description = "Redirect to a time-limited logo URL"),
        (status = 404, description = "No logo uploaded", body = ErrorRes)
    )
)]
#[axum::debug_handler(state = AppState)]
pub async fn get_logo(
    State(state): State<AppState>,
    CurrentDoctor(doctor): CurrentDoctor,
) -> Result<Redirect, ApiError> {
    let logos = state.services.logos.clone();
    let ttl = state.services.download_url_ttl();
    let url = blocking(move || Ok(logos.download_url(doctor.id, ttl)?)).await?;

    url.map(|url| Redirect::temporary(&url))
        .ok_or_else(|| RxError::not_found("hospital logo", doctor.id.to_string()).into())
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body_bytes, body_json, get, put_json, with_auth, TestApp};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;

    const BOUNDARY: &str = "rxpad-test-boundary";

    fn multipart_logo(field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        with_auth(Request::put("/profile/logo"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_profile_update_is_partial() {
        let app = TestApp::new();

        let res = app
            .call(put_json("/profile", json!({"hospital_name": "City Clinic", "experience_years": 12})))
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .call(put_json("/profile", json!({"specialization": "Cardiology"})))
            .await;
        let profile = body_json(res).await;
        assert_eq!(profile["hospital_name"], "City Clinic");
        assert_eq!(profile["experience_years"], 12);
        assert_eq!(profile["specialization"], "Cardiology");
        assert_eq!(profile["has_hospital_logo"], false);
    }

    #[tokio::test]
    async fn test_logo_upload_then_redirect() {
        let app = TestApp::new();

        let res = app.call(get("/profile/logo")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app.call(multipart_logo("logo", "clinic.png", b"\x89PNG fake")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["has_hospital_logo"], true);

        let res = app.call(get("/profile/logo")).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.contains("/blobs/hospital_logos/"), "{location}");

        let res = app.call(get(location.trim_start_matches("http://localhost:3000"))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(body_bytes(res).await, b"\x89PNG fake".to_vec());
    }

    #[tokio::test]
    async fn test_logo_with_bad_extension_is_rejected() {
        let app = TestApp::new();
        let res = app.call(multipart_logo("logo", "clinic.exe", b"MZ")).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["field"], "logo");
    }

    #[tokio::test]
    async fn test_logo_request_without_file_is_rejected() {
        let app = TestApp::new();
        let res = app.call(multipart_logo("other", "clinic.png", b"x")).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
