//! Mapping of core errors onto HTTP responses.

use api_shared::{AuthError, ErrorRes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rxpad_core::RxError;
use rxpad_files::BlobError;

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    Core(RxError),
    Auth(AuthError),
    Blob(BlobError),
    BadRequest(String),
    Internal(String),
}

impl From<RxError> for ApiError {
    fn from(e: RxError) -> Self {
        Self::Core(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<BlobError> for ApiError {
    fn from(e: BlobError) -> Self {
        Self::Blob(e)
    }
}

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorRes) {
        let plain = |status: StatusCode, error: String| {
            (status, ErrorRes { error, field: None })
        };

        match self {
            Self::Core(RxError::Validation { field, message }) => (
                StatusCode::BAD_REQUEST,
                ErrorRes {
                    error: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            Self::Core(e @ RxError::Identifier(_)) => plain(StatusCode::BAD_REQUEST, e.to_string()),
            Self::Core(e @ RxError::Unauthorized(_)) => plain(StatusCode::UNAUTHORIZED, e.to_string()),
            Self::Core(e @ RxError::NotFound { .. }) => plain(StatusCode::NOT_FOUND, e.to_string()),
            Self::Core(e @ RxError::Conflict(_)) => plain(StatusCode::CONFLICT, e.to_string()),
            Self::Core(e @ (RxError::Render(_) | RxError::Archive(_))) => {
                plain(StatusCode::BAD_GATEWAY, e.to_string())
            }
            Self::Core(_) => plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()),
            Self::Auth(e) => plain(StatusCode::UNAUTHORIZED, e.to_string()),
            Self::Blob(BlobError::Signature(_) | BlobError::Expired) => {
                plain(StatusCode::FORBIDDEN, "Invalid or expired link".into())
            }
            Self::Blob(BlobError::NotFound(_) | BlobError::InvalidKey(_)) => {
                plain(StatusCode::NOT_FOUND, "Not found".into())
            }
            Self::Blob(_) => plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()),
            Self::BadRequest(message) => plain(StatusCode::BAD_REQUEST, message.clone()),
            Self::Internal(_) => plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        } else {
            tracing::debug!("request rejected ({}): {}", status, body.error);
        }
        (status, Json(body)).into_response()
    }
}
