//! Hospital logo uploads.
//!
//! Logos are stored privately like every other blob, under
//! `hospital_logos/<doctor_id>/logo_<doctor_id>.<ext>`, and read back through a signed URL.

use crate::artifacts::sign_existing;
use crate::constants::{ALLOWED_LOGO_EXTENSIONS, HOSPITAL_LOGOS_PREFIX};
use crate::models::DoctorProfile;
use crate::repositories::doctors::DoctorStore;
use crate::{RxError, RxResult};
use rxpad_files::{BlobKey, BlobStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Returns the lowercased extension of `filename` if it is an accepted image type.
fn logo_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_LOGO_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}

fn content_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

#[derive(Clone)]
pub struct HospitalLogos {
    blobs: Arc<dyn BlobStore>,
    doctors: DoctorStore,
}

impl HospitalLogos {
    pub fn new(blobs: Arc<dyn BlobStore>, doctors: DoctorStore) -> Self {
        Self { blobs, doctors }
    }

    /// Stores a doctor's logo, replacing any previous one with the same extension, and records
    /// its path on the profile.
    ///
    /// # Errors
    ///
    /// Returns `RxError` if:
    /// - the file is empty or not png/jpg/jpeg/gif ([`RxError::Validation`])
    /// - the upload or profile update fails
    pub fn upload(&self, doctor_id: i64, filename: &str, bytes: &[u8]) -> RxResult<DoctorProfile> {
        let ext = logo_extension(filename).ok_or_else(|| {
            RxError::validation(
                "logo",
                format!("allowed file types: {}", ALLOWED_LOGO_EXTENSIONS.join(", ")),
            )
        })?;
        if bytes.is_empty() {
            return Err(RxError::validation("logo", "file is empty"));
        }

        let id = doctor_id.to_string();
        let key = BlobKey::from_segments(&[
            HOSPITAL_LOGOS_PREFIX,
            &id,
            &format!("logo_{}.{}", id, ext),
        ])?;
        let uploaded = self.blobs.upload(bytes, &key, Some(content_type(&ext)))?;

        tracing::info!("stored hospital logo for doctor {} at {}", doctor_id, uploaded.path);
        self.doctors.set_hospital_logo(doctor_id, &uploaded.path)
    }

    /// Signed URL for the doctor's logo, or `None` if no logo is available.
    pub fn download_url(&self, doctor_id: i64, ttl: Duration) -> RxResult<Option<String>> {
        let profile = self.doctors.get_profile(doctor_id)?;
        Ok(profile
            .hospital_logo_path
            .as_deref()
            .and_then(|path| sign_existing(self.blobs.as_ref(), path, ttl)))
    }
}
