//! Request and response bodies.
//!
//! Timestamps are RFC 3339 strings and dates are `YYYY-MM-DD`. Medications and canvas pages are
//! caller-defined JSON, passed through untouched.

use rxpad_core::{
    DashboardStats, Doctor, DoctorProfile, NewPatient, Page, Patient, Prescription,
    PrescriptionSummary, ProfileUpdate,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body of every non-2xx JSON response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,

    /// Offending field, for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

// ============================================================================
// Patients
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    pub patient_id: String,
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
    pub created_at: String,
}

impl From<Patient> for PatientRes {
    fn from(p: Patient) -> Self {
        Self {
            patient_id: p.patient_id.to_string(),
            name: p.name,
            age: p.age,
            gender: p.gender,
            phone: p.phone,
            email: p.email,
            address: p.address,
            emergency_contact: p.emergency_contact,
            blood_group: p.blood_group,
            allergies: p.allergies,
            medical_history: p.medical_history,
            is_starred: p.is_starred,
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

/// Patient fields as submitted, standalone or inline with a prescription.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreatePatientReq {
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

impl From<CreatePatientReq> for NewPatient {
    fn from(r: CreatePatientReq) -> Self {
        Self {
            name: r.name,
            age: r.age,
            gender: r.gender,
            phone: r.phone,
            email: r.email,
            address: r.address,
            emergency_contact: r.emergency_contact,
            blood_group: r.blood_group,
            allergies: r.allergies,
            medical_history: r.medical_history,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientPageRes {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u64,
    pub patients: Vec<PatientRes>,
}

impl From<Page<Patient>> for PatientPageRes {
    fn from(page: Page<Patient>) -> Self {
        Self {
            pages: page.pages(),
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            patients: page.items.into_iter().map(PatientRes::from).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientDetailRes {
    pub patient: PatientRes,
    pub prescriptions: Vec<PrescriptionSummaryRes>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StarRes {
    pub is_starred: bool,
}

// ============================================================================
// Prescriptions
// ============================================================================

/// A new prescription. Exactly one of `patient_id` and `patient_info` is used; `patient_id`
/// wins when both are present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreatePrescriptionReq {
    pub patient_id: Option<String>,
    pub patient_info: Option<CreatePatientReq>,
    pub chief_complaint: String,
    pub diagnosis: String,
    #[schema(value_type = Object)]
    pub medications: serde_json::Value,
    pub notes: String,

    /// Strict `YYYY-MM-DD`
    pub follow_up_date: Option<String>,
    pub is_rare_case: bool,
    #[schema(value_type = Object)]
    pub canvas_pages: serde_json::Value,
    pub signature_data: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreatePrescriptionRes {
    pub success: bool,
    pub prescription_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionRes {
    pub prescription_id: String,
    pub patient: PatientRes,
    pub chief_complaint: String,
    pub diagnosis: String,
    #[schema(value_type = Object)]
    pub medications: serde_json::Value,
    pub notes: String,
    pub follow_up_date: Option<String>,
    pub is_rare_case: bool,
    #[schema(value_type = Object)]
    pub canvas_pages: serde_json::Value,
    pub signature_data: Option<String>,
    pub has_pdf: bool,
    pub pdf_filename: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PrescriptionRes {
    /// Combines a stored prescription with its patient.
    ///
    /// Stored opaque fields that are not valid JSON are returned as JSON strings.
    pub fn new(rx: Prescription, patient: Patient) -> Self {
        Self {
            prescription_id: rx.prescription_id.to_string(),
            patient: patient.into(),
            chief_complaint: rx.chief_complaint,
            diagnosis: rx.diagnosis,
            medications: opaque(rx.medications),
            notes: rx.notes,
            follow_up_date: rx.follow_up_date.map(|d| d.format("%Y-%m-%d").to_string()),
            is_rare_case: rx.is_rare_case,
            canvas_pages: opaque(rx.canvas_pages),
            signature_data: rx.signature_data,
            has_pdf: rx.pdf_cloud_path.is_some(),
            pdf_filename: rx.pdf_filename,
            created_at: rx.created_at.to_rfc3339(),
            updated_at: rx.updated_at.to_rfc3339(),
        }
    }
}

fn opaque(text: String) -> serde_json::Value {
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionSummaryRes {
    pub prescription_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub is_rare_case: bool,
    pub follow_up_date: Option<String>,
    pub has_pdf: bool,
    pub created_at: String,
}

impl From<PrescriptionSummary> for PrescriptionSummaryRes {
    fn from(s: PrescriptionSummary) -> Self {
        Self {
            prescription_id: s.prescription_id.to_string(),
            patient_id: s.patient_id.to_string(),
            patient_name: s.patient_name,
            chief_complaint: s.chief_complaint,
            diagnosis: s.diagnosis,
            is_rare_case: s.is_rare_case,
            follow_up_date: s.follow_up_date.map(|d| d.format("%Y-%m-%d").to_string()),
            has_pdf: s.has_pdf,
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionPageRes {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u64,
    pub prescriptions: Vec<PrescriptionSummaryRes>,
}

impl From<Page<PrescriptionSummary>> for PrescriptionPageRes {
    fn from(page: Page<PrescriptionSummary>) -> Self {
        Self {
            pages: page.pages(),
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            prescriptions: page.items.into_iter().map(Into::into).collect(),
        }
    }
}

/// HTML to render, optionally archived against an existing prescription.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeneratePdfReq {
    pub html_content: String,
    #[serde(default)]
    pub prescription_id: Option<String>,
}

// ============================================================================
// Doctors
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DoctorRes {
    pub email: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub provider: String,
}

impl From<Doctor> for DoctorRes {
    fn from(d: Doctor) -> Self {
        Self {
            email: d.email,
            name: d.name,
            profile_picture: d.profile_picture,
            provider: d.provider,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProfileRes {
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
    pub has_hospital_logo: bool,
    pub education: String,
    pub certifications: String,
    pub signature: Option<String>,
    pub updated_at: String,
}

impl From<DoctorProfile> for ProfileRes {
    fn from(p: DoctorProfile) -> Self {
        Self {
            full_name: p.full_name,
            designation: p.designation,
            specialization: p.specialization,
            license_number: p.license_number,
            experience_years: p.experience_years,
            phone: p.phone,
            hospital_name: p.hospital_name,
            hospital_address: p.hospital_address,
            hospital_phone: p.hospital_phone,
            hospital_email: p.hospital_email,
            has_hospital_logo: p.hospital_logo_path.is_some(),
            education: p.education,
            certifications: p.certifications,
            signature: p.signature,
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

/// Partial profile update; omitted fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateProfileReq {
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

impl From<UpdateProfileReq> for ProfileUpdate {
    fn from(r: UpdateProfileReq) -> Self {
        Self {
            full_name: r.full_name,
            designation: r.designation,
            specialization: r.specialization,
            license_number: r.license_number,
            experience_years: r.experience_years,
            phone: r.phone,
            hospital_name: r.hospital_name,
            hospital_address: r.hospital_address,
            hospital_phone: r.hospital_phone,
            hospital_email: r.hospital_email,
            education: r.education,
            certifications: r.certifications,
            signature: r.signature,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardRes {
    pub doctor: DoctorRes,
    pub total_patients: u64,
    pub total_prescriptions: u64,
    pub starred_patients: u64,
    pub rare_cases: u64,
    pub recent_prescriptions: Vec<PrescriptionSummaryRes>,
    pub recent_patients: Vec<PatientRes>,
}

impl DashboardRes {
    pub fn new(doctor: Doctor, stats: DashboardStats) -> Self {
        Self {
            doctor: doctor.into(),
            total_patients: stats.total_patients,
            total_prescriptions: stats.total_prescriptions,
            starred_patients: stats.starred_patients,
            rare_cases: stats.rare_cases,
            recent_prescriptions: stats.recent_prescriptions.into_iter().map(Into::into).collect(),
            recent_patients: stats.recent_patients.into_iter().map(Into::into).collect(),
        }
    }
}
