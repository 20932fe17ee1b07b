//! Record types read from and written to the relational store.

use chrono::{DateTime, NaiveDate, Utc};
use rxpad_ident::ExternalId;
use serde::{Deserialize, Serialize};

/// A prescription as stored.
///
/// `medications` and `canvas_pages` hold caller-defined JSON exactly as submitted; the store
/// never inspects their structure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prescription {
    pub id: i64,
    pub prescription_id: ExternalId,
    pub doctor_id: i64,

    /// Internal key of the patient
    pub patient_id: i64,

    pub chief_complaint: String,
    pub diagnosis: String,
    pub medications: String,
    pub notes: String,
    pub follow_up_date: Option<NaiveDate>,
    pub is_rare_case: bool,
    pub canvas_pages: String,
    pub signature_data: Option<String>,

    /// Set only from a successful archival
    pub pdf_cloud_path: Option<String>,
    pub pdf_filename: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact prescription row joined with its patient, used by listings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrescriptionSummary {
    pub prescription_id: ExternalId,
    pub patient_id: ExternalId,
    pub patient_name: String,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub is_rare_case: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub has_pdf: bool,
    pub created_at: DateTime<Utc>,
}

/// A patient as stored. Patients are shared across the practice.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Patient {
    pub id: i64,
    pub patient_id: ExternalId,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub emergency_contact: String,
    pub blood_group: String,
    pub allergies: String,
    pub medical_history: String,
    pub is_starred: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a patient that does not exist yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewPatient {
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub emergency_contact: String,
    pub blood_group: String,
    pub allergies: String,
    pub medical_history: String,
}

/// Which patient a new prescription is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatientSelector {
    /// An existing patient, by external identifier
    Existing(String),

    /// A patient to create in the same transaction as the prescription
    Inline(NewPatient),
}

/// Clinical content of a new prescription, finalized by the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClinicalFields {
    pub chief_complaint: String,
    pub diagnosis: String,
    pub notes: String,

    /// Serialized as-is; `null` is stored as an empty list
    pub medications: serde_json::Value,

    /// Serialized as-is; `null` is stored as an empty list
    pub canvas_pages: serde_json::Value,

    pub signature_data: Option<String>,
    pub is_rare_case: bool,

    /// Strict `YYYY-MM-DD`; empty means no follow-up
    pub follow_up_date: Option<String>,
}

/// An authenticated doctor identity forwarded by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub name: String,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub picture: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Doctor {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub provider: String,
    pub provider_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Professional and hospital details printed on a doctor's prescriptions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DoctorProfile {
    pub doctor_id: i64,
    pub full_name: String,
    pub designation: String,
    pub specialization: String,
    pub license_number: String,
    pub experience_years: i64,
    pub phone: String,
    pub hospital_name: String,
    pub hospital_address: String,
    pub hospital_phone: String,
    pub hospital_email: String,

    /// Blob key of the uploaded logo
    pub hospital_logo_path: Option<String>,

    pub education: String,
    pub certifications: String,
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub designation: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: Option<i64>,
    pub phone: Option<String>,
    pub hospital_name: Option<String>,
    pub hospital_address: Option<String>,
    pub hospital_phone: Option<String>,
    pub hospital_email: Option<String>,
    pub education: Option<String>,
    pub certifications: Option<String>,
    pub signature: Option<String>,
}

/// One page of a listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` rows.
    pub fn pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.pages()
    }
}

/// Normalizes a 1-based page number and returns `(page, offset)`.
pub(crate) fn page_offset(page: u32, per_page: u32) -> (u32, i64) {
    let page = page.max(1);
    (page, i64::from(page - 1) * i64::from(per_page))
}
