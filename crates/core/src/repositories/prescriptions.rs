//! Prescription records.
//!
//! ## Lifecycle
//!
//! A prescription is written once, at submission time, with all clinical content already
//! finalized. The only later mutation is [`PrescriptionStore::attach_artifact`], which records
//! where the rendered PDF was archived. Prescriptions are never deleted and their external
//! identifier never changes.
//!
//! ## Atomic creation
//!
//! When no existing patient is referenced, creation is an explicit two-step transaction:
//!
//! 1. insert the inline patient
//! 2. insert the prescription referencing that patient
//!
//! Both statements run on one SQLite transaction which is committed only after step 2. Any
//! failure (including an identifier collision on either insert) rolls both back, so no patient
//! is left behind without its prescription.

use crate::constants::PAGE_SIZE;
use crate::db::Database;
use crate::models::{
    page_offset, ClinicalFields, Page, PatientSelector, Prescription, PrescriptionSummary,
};
use crate::repositories::external_id;
use crate::repositories::patients::{find_internal_id, insert_patient, validate_new_patient};
use crate::{RxError, RxResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rxpad_ident::{ExternalId, IdPrefix, IdentifierSource};
use rxpad_types::parse_strict_date;
use std::sync::Arc;

const PRESCRIPTION_COLUMNS: &str = "id, prescription_id, doctor_id, patient_id, chief_complaint, \
     diagnosis, medications, notes, follow_up_date, is_rare_case, canvas_pages, signature_data, \
     pdf_cloud_path, pdf_filename, created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT r.prescription_id, p.patient_id AS patient_external_id, \
     p.name AS patient_name, r.chief_complaint, r.diagnosis, r.is_rare_case, r.follow_up_date, \
     r.pdf_cloud_path IS NOT NULL AS has_pdf, r.created_at \
     FROM prescriptions r JOIN patients p ON p.id = r.patient_id";

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: row.get("id")?,
        prescription_id: external_id(row, "prescription_id", IdPrefix::Prescription)?,
        doctor_id: row.get("doctor_id")?,
        patient_id: row.get("patient_id")?,
        chief_complaint: row.get("chief_complaint")?,
        diagnosis: row.get("diagnosis")?,
        medications: row.get("medications")?,
        notes: row.get("notes")?,
        follow_up_date: row.get("follow_up_date")?,
        is_rare_case: row.get("is_rare_case")?,
        canvas_pages: row.get("canvas_pages")?,
        signature_data: row.get("signature_data")?,
        pdf_cloud_path: row.get("pdf_cloud_path")?,
        pdf_filename: row.get("pdf_filename")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionSummary> {
    Ok(PrescriptionSummary {
        prescription_id: external_id(row, "prescription_id", IdPrefix::Prescription)?,
        patient_id: external_id(row, "patient_external_id", IdPrefix::Patient)?,
        patient_name: row.get("patient_name")?,
        chief_complaint: row.get("chief_complaint")?,
        diagnosis: row.get("diagnosis")?,
        is_rare_case: row.get("is_rare_case")?,
        follow_up_date: row.get("follow_up_date")?,
        has_pdf: row.get("has_pdf")?,
        created_at: row.get("created_at")?,
    })
}

/// Serializes caller-defined JSON into the stored text form. `null` becomes an empty list.
fn encode_opaque(value: &serde_json::Value) -> RxResult<String> {
    if value.is_null() {
        return Ok("[]".to_string());
    }
    Ok(serde_json::to_string(value)?)
}

/// Parses the optional follow-up date; blank input means no follow-up.
fn parse_follow_up(value: Option<&str>) -> RxResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => parse_strict_date(v)
            .map(Some)
            .map_err(|e| RxError::validation("follow_up_date", e.to_string())),
    }
}

/// Fully validated prescription content, ready to insert.
struct PreparedPrescription<'a> {
    fields: &'a ClinicalFields,
    medications: String,
    canvas_pages: String,
    follow_up_date: Option<NaiveDate>,
}

fn insert_prescription(
    conn: &Connection,
    prescription_id: &ExternalId,
    doctor_id: i64,
    patient_pk: i64,
    rx: &PreparedPrescription<'_>,
    now: DateTime<Utc>,
) -> RxResult<i64> {
    conn.execute(
        "INSERT INTO prescriptions (prescription_id, doctor_id, patient_id, chief_complaint,
             diagnosis, medications, notes, follow_up_date, is_rare_case, canvas_pages,
             signature_data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            prescription_id.as_str(),
            doctor_id,
            patient_pk,
            rx.fields.chief_complaint,
            rx.fields.diagnosis,
            rx.medications,
            rx.fields.notes,
            rx.follow_up_date,
            rx.fields.is_rare_case,
            rx.canvas_pages,
            rx.fields.signature_data,
            now,
        ],
    )
    .map_err(|e| RxError::from_insert(e, &format!("prescription {}", prescription_id)))?;

    Ok(conn.last_insert_rowid())
}

/// Store for prescription records.
#[derive(Clone)]
pub struct PrescriptionStore {
    db: Database,
    ids: Arc<dyn IdentifierSource>,
}

impl PrescriptionStore {
    pub fn new(db: Database, ids: Arc<dyn IdentifierSource>) -> Self {
        Self { db, ids }
    }

    /// Persists a new prescription, creating its patient first when none is referenced.
    ///
    /// # Arguments
    ///
    /// * `doctor_id` - Internal key of the authoring doctor
    /// * `patient` - Existing patient identifier or inline patient fields
    /// * `fields` - Finalized clinical content
    ///
    /// # Returns
    ///
    /// The stored prescription, including its generated `RX` identifier.
    ///
    /// # Errors
    ///
    /// Returns `RxError` if:
    /// - the follow-up date is not a strict `YYYY-MM-DD` date or the inline patient has no name
    ///   ([`RxError::Validation`]); nothing is written in that case
    /// - the referenced patient does not exist ([`RxError::NotFound`])
    /// - a generated identifier collides with an existing one ([`RxError::Conflict`])
    /// - any database operation fails
    pub fn create(
        &self,
        doctor_id: i64,
        patient: PatientSelector,
        fields: ClinicalFields,
    ) -> RxResult<Prescription> {
        let prepared = PreparedPrescription {
            follow_up_date: parse_follow_up(fields.follow_up_date.as_deref())?,
            medications: encode_opaque(&fields.medications)?,
            canvas_pages: encode_opaque(&fields.canvas_pages)?,
            fields: &fields,
        };
        let inline_name = match &patient {
            PatientSelector::Inline(new) => Some(validate_new_patient(new, "patient_info.")?),
            PatientSelector::Existing(_) => None,
        };

        let prescription_id = self.ids.next_id(IdPrefix::Prescription);
        let now = Utc::now();

        let id = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;

            let patient_pk = match (&patient, &inline_name) {
                (PatientSelector::Existing(patient_id), _) => {
                    find_internal_id(&tx, patient_id)?
                        .ok_or_else(|| RxError::not_found("patient", patient_id.as_str()))?
                }
                (PatientSelector::Inline(new), Some(name)) => {
                    let patient_id = self.ids.next_id(IdPrefix::Patient);
                    insert_patient(&tx, &patient_id, name, new, now)?
                }
                (PatientSelector::Inline(_), None) => {
                    return Err(RxError::validation("patient_info.name", "name is required"));
                }
            };

            let id = insert_prescription(&tx, &prescription_id, doctor_id, patient_pk, &prepared, now)?;
            tx.commit()?;
            Ok(id)
        })?;

        tracing::info!("created prescription {} for doctor {}", prescription_id, doctor_id);
        self.get_by_internal_id(id)
    }

    fn get_by_internal_id(&self, id: i64) -> RxResult<Prescription> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM prescriptions WHERE id = ?1", PRESCRIPTION_COLUMNS),
                [id],
                prescription_from_row,
            )
            .optional()?
            .ok_or_else(|| RxError::not_found("prescription", id.to_string()))
        })
    }

    /// Fetches a prescription by external identifier, regardless of author.
    pub fn get(&self, prescription_id: &str) -> RxResult<Prescription> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM prescriptions WHERE prescription_id = ?1",
                    PRESCRIPTION_COLUMNS
                ),
                [prescription_id],
                prescription_from_row,
            )
            .optional()?
            .ok_or_else(|| RxError::not_found("prescription", prescription_id))
        })
    }

    /// Fetches a prescription only if it was authored by `doctor_id`.
    ///
    /// Another doctor's prescription is reported as not found.
    pub fn get_for_doctor(&self, prescription_id: &str, doctor_id: i64) -> RxResult<Prescription> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM prescriptions WHERE prescription_id = ?1 AND doctor_id = ?2",
                    PRESCRIPTION_COLUMNS
                ),
                params![prescription_id, doctor_id],
                prescription_from_row,
            )
            .optional()?
            .ok_or_else(|| RxError::not_found("prescription", prescription_id))
        })
    }

    /// Records the archived artifact on a prescription.
    ///
    /// Callers must only pass a path returned by a successful upload.
    pub fn attach_artifact(
        &self,
        prescription_id: &str,
        path: &str,
        filename: &str,
    ) -> RxResult<Prescription> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE prescriptions SET pdf_cloud_path = ?2, pdf_filename = ?3, updated_at = ?4
                 WHERE prescription_id = ?1",
                params![prescription_id, path, filename, Utc::now()],
            )?)
        })?;

        if changed == 0 {
            return Err(RxError::not_found("prescription", prescription_id));
        }
        self.get(prescription_id)
    }

    /// A doctor's prescriptions, newest first, [`PAGE_SIZE`] per page.
    pub fn history(&self, doctor_id: i64, page: u32) -> RxResult<Page<PrescriptionSummary>> {
        let (page, offset) = page_offset(page, PAGE_SIZE);

        self.db.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM prescriptions WHERE doctor_id = ?1",
                [doctor_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{} WHERE r.doctor_id = ?1 ORDER BY r.created_at DESC, r.id DESC LIMIT ?2 OFFSET ?3",
                SUMMARY_SELECT
            ))?;
            let items = stmt
                .query_map(params![doctor_id, PAGE_SIZE, offset], summary_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page {
                page,
                per_page: PAGE_SIZE,
                total: u64::try_from(total).unwrap_or(0),
                items,
            })
        })
    }

    /// A doctor's rare-case prescriptions created at or after `since`, newest first.
    pub fn rare_cases(&self, doctor_id: i64, since: DateTime<Utc>) -> RxResult<Vec<PrescriptionSummary>> {
        self.summaries(
            "WHERE r.doctor_id = ?1 AND r.is_rare_case = 1 AND r.created_at >= ?2 \
             ORDER BY r.created_at DESC, r.id DESC",
            params![doctor_id, since],
        )
    }

    /// A patient's prescriptions from every doctor, newest first.
    pub fn for_patient(&self, patient_pk: i64) -> RxResult<Vec<PrescriptionSummary>> {
        self.summaries(
            "WHERE r.patient_id = ?1 ORDER BY r.created_at DESC, r.id DESC",
            params![patient_pk],
        )
    }

    /// A doctor's most recent prescriptions.
    pub fn recent(&self, doctor_id: i64, limit: u32) -> RxResult<Vec<PrescriptionSummary>> {
        self.summaries(
            "WHERE r.doctor_id = ?1 ORDER BY r.created_at DESC, r.id DESC LIMIT ?2",
            params![doctor_id, limit],
        )
    }

    fn summaries(
        &self,
        clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> RxResult<Vec<PrescriptionSummary>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} {}", SUMMARY_SELECT, clause))?;
            let rows = stmt
                .query_map(params, summary_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_for_doctor(&self, doctor_id: i64) -> RxResult<u64> {
        self.count("SELECT COUNT(*) FROM prescriptions WHERE doctor_id = ?1", doctor_id)
    }

    pub fn count_rare_for_doctor(&self, doctor_id: i64) -> RxResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM prescriptions WHERE doctor_id = ?1 AND is_rare_case = 1",
            doctor_id,
        )
    }

    fn count(&self, sql: &str, doctor_id: i64) -> RxResult<u64> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row(sql, [doctor_id], |row| row.get(0))?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
    }

    /// Every recorded artifact path, sorted.
    pub fn list_archived_paths(&self) -> RxResult<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT pdf_cloud_path FROM prescriptions
                 WHERE pdf_cloud_path IS NOT NULL ORDER BY pdf_cloud_path",
            )?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }
}
