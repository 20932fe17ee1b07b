//! Fixtures shared by the unit tests here and, through the `test-support` feature, by
//! downstream crates' tests.

use crate::db::Database;
use crate::models::Principal;
use crate::render::{DocumentRenderer, RenderError, RenderOptions};
use crate::repositories::doctors::DoctorStore;
use rxpad_files::{BlobError, BlobKey, BlobResult, BlobStore, UploadedBlob};
use rxpad_ident::{ExternalId, IdPrefix, IdentifierSource, RandomIdentifiers};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Hands out queued identifiers whose prefix matches the request, falling back to random ones.
pub struct FixedIdentifiers {
    queue: Mutex<VecDeque<ExternalId>>,
}

impl FixedIdentifiers {
    pub fn new(ids: Vec<ExternalId>) -> Self {
        Self {
            queue: Mutex::new(ids.into()),
        }
    }
}

impl IdentifierSource for FixedIdentifiers {
    fn next_id(&self, prefix: IdPrefix) -> ExternalId {
        let mut queue = self.queue.lock().unwrap();
        match queue.iter().position(|id| id.prefix() == prefix) {
            Some(index) => queue.remove(index).unwrap(),
            None => RandomIdentifiers.next_id(prefix),
        }
    }
}

/// Registers a doctor for `email` and returns their internal id.
pub fn register_doctor(db: &Database, email: &str) -> i64 {
    DoctorStore::new(db.clone())
        .resolve_or_register(&Principal {
            email: email.into(),
            name: email.split('@').next().unwrap_or(email).into(),
            provider: None,
            provider_id: None,
            picture: None,
        })
        .unwrap()
        .id
}

/// Blob store whose uploads always fail and which holds nothing.
pub struct FailingUploads;

impl BlobStore for FailingUploads {
    fn upload(&self, _: &[u8], _: &BlobKey, _: Option<&str>) -> BlobResult<UploadedBlob> {
        Err(BlobError::Status {
            status: 503,
            body: "storage unavailable".into(),
        })
    }

    fn signed_url(&self, key: &BlobKey, _: Duration) -> BlobResult<String> {
        Err(BlobError::NotFound(key.to_string()))
    }

    fn exists(&self, _: &BlobKey) -> BlobResult<bool> {
        Ok(false)
    }

    fn list(&self, _: &str) -> BlobResult<Vec<BlobKey>> {
        Ok(Vec::new())
    }
}

/// Renderer that wraps the HTML in a PDF header instead of running an engine.
pub struct FakeRenderer;

impl DocumentRenderer for FakeRenderer {
    fn render(&self, html: &str, _: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        if html.trim().is_empty() {
            return Err(RenderError::EmptyInput);
        }
        let mut pdf = b"%PDF-1.4\n".to_vec();
        pdf.extend_from_slice(html.as_bytes());
        Ok(pdf)
    }
}
