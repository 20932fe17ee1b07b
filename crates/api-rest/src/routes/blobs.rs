use crate::{blocking, ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use rxpad_files::BlobError;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SignedQuery {
    /// Unix expiry of the link
    pub expires: i64,

    /// Hex HMAC over the key and expiry
    pub signature: String,
}

fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[utoipa::path(
    get,
    path = "/blobs/{key}",
    params(
        ("key" = String, Path, description = "Storage key, e.g. prescriptions/RX.../prescription_RX....pdf"),
        SignedQuery
    ),
    responses(
        (status = 200, description = "Object bytes"),
        (status = 403, description = "Bad signature or expired link"),
        (status = 404, description = "No such object, or blobs are not served locally")
    )
)]
/// Serves a locally stored blob to the holder of a valid signed link.
///
/// No credentials are needed; the signature is the authorization.
#[axum::debug_handler(state = AppState)]
pub async fn download_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, ApiError> {
    let Some(store) = state.local_blobs.clone() else {
        return Err(BlobError::NotFound(key).into());
    };

    let content_type = content_type_for(&key);
    let bytes = blocking(move || {
        Ok(store.open_signed(&key, query.expires, &query.signature, chrono::Utc::now())?)
    })
    .await?;

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestApp;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("prescriptions/RX1/prescription_RX1.pdf"), "application/pdf");
        assert_eq!(content_type_for("hospital_logos/1/logo_1.JPG"), "image/jpeg");
        assert_eq!(content_type_for("misc/blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_tampered_signature_is_forbidden() {
        let app = TestApp::new();
        let req = Request::get("/blobs/prescriptions/RX1/prescription_RX1.pdf?expires=9999999999&signature=00ff")
            .body(Body::empty())
            .unwrap();
        let res = app.call(req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected() {
        let app = TestApp::new();
        let req = Request::get("/blobs/prescriptions/RX1/prescription_RX1.pdf")
            .body(Body::empty())
            .unwrap();
        let res = app.call(req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
