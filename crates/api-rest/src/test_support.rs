//! In-process router harness for handler tests.

use crate::{router, AppState};
use axum::body::Body;
use axum::http::{header, request, Request};
use axum::response::Response;
use http_body_util::BodyExt;
use rxpad_core::testing::FakeRenderer;
use rxpad_core::{CoreServices, Database};
use rxpad_files::{BlobStore, LocalBlobStore};
use rxpad_ident::RandomIdentifiers;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub(crate) const TEST_API_KEY: &str = "test-key";
pub(crate) const TEST_EMAIL: &str = "ada@example.com";

pub(crate) struct TestApp {
    _dir: TempDir,
    state: AppState,
}

impl TestApp {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let local = Arc::new(
            LocalBlobStore::new(dir.path(), "http://localhost:3000", b"test-signing-key".to_vec())
                .unwrap(),
        );
        let blobs: Arc<dyn BlobStore> = local.clone();

        let services = CoreServices::new(
            Database::open_in_memory().unwrap(),
            blobs,
            Arc::new(FakeRenderer),
            Arc::new(RandomIdentifiers),
            Duration::from_secs(600),
        );

        Self {
            _dir: dir,
            state: AppState {
                services,
                api_key: Arc::from(TEST_API_KEY),
                local_blobs: Some(local),
            },
        }
    }

    /// Sends one request through a fresh router.
    pub(crate) async fn call(&self, req: Request<Body>) -> Response {
        router(self.state.clone()).oneshot(req).await.unwrap()
    }

    /// Sends `req` with its principal replaced by `email`.
    pub(crate) async fn call_as(&self, email: &str, mut req: Request<Body>) -> Response {
        req.headers_mut()
            .insert(api_shared::auth::EMAIL_HEADER, email.parse().unwrap());
        self.call(req).await
    }
}

/// Adds the API key and a default principal.
pub(crate) fn with_auth(builder: request::Builder) -> request::Builder {
    builder
        .header(api_shared::auth::API_KEY_HEADER, TEST_API_KEY)
        .header(api_shared::auth::EMAIL_HEADER, TEST_EMAIL)
        .header(api_shared::auth::NAME_HEADER, "Dr Ada")
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    with_auth(Request::get(uri)).body(Body::empty()).unwrap()
}

fn json_request(builder: request::Builder, body: serde_json::Value) -> Request<Body> {
    with_auth(builder)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(crate) fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    json_request(Request::post(uri), body)
}

pub(crate) fn put_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    json_request(Request::put(uri), body)
}

pub(crate) async fn body_bytes(res: Response) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub(crate) async fn body_json(res: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(res).await).unwrap()
}
