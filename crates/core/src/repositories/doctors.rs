//! Doctor accounts and profiles.
//!
//! Doctors are never created explicitly: the first request from an authenticated principal
//! registers the doctor (keyed by email) together with an empty profile.

use crate::db::Database;
use crate::models::{Doctor, DoctorProfile, Principal, ProfileUpdate};
use crate::{RxError, RxResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const DOCTOR_COLUMNS: &str =
    "id, email, name, profile_picture, provider, provider_id, is_active, created_at";

const PROFILE_COLUMNS: &str = "doctor_id, full_name, designation, specialization, \
     license_number, experience_years, phone, hospital_name, hospital_address, hospital_phone, \
     hospital_email, hospital_logo_path, education, certifications, signature, created_at, updated_at";

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        profile_picture: row.get("profile_picture")?,
        provider: row.get("provider")?,
        provider_id: row.get("provider_id")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<DoctorProfile> {
    Ok(DoctorProfile {
        doctor_id: row.get("doctor_id")?,
        full_name: row.get("full_name")?,
        designation: row.get("designation")?,
        specialization: row.get("specialization")?,
        license_number: row.get("license_number")?,
        experience_years: row.get("experience_years")?,
        phone: row.get("phone")?,
        hospital_name: row.get("hospital_name")?,
        hospital_address: row.get("hospital_address")?,
        hospital_phone: row.get("hospital_phone")?,
        hospital_email: row.get("hospital_email")?,
        hospital_logo_path: row.get("hospital_logo_path")?,
        education: row.get("education")?,
        certifications: row.get("certifications")?,
        signature: row.get("signature")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn select_doctor(conn: &Connection, doctor_id: i64) -> RxResult<Option<Doctor>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM doctors WHERE id = ?1", DOCTOR_COLUMNS),
            [doctor_id],
            doctor_from_row,
        )
        .optional()?)
}

/// Creates the empty profile for `doctor_id` if it does not exist yet.
fn ensure_profile(conn: &Connection, doctor_id: i64) -> RxResult<()> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO doctor_profiles (doctor_id, full_name, created_at, updated_at)
         SELECT id, name, ?2, ?2 FROM doctors WHERE id = ?1
         ON CONFLICT(doctor_id) DO NOTHING",
        params![doctor_id, now],
    )?;
    Ok(())
}

fn select_profile(conn: &Connection, doctor_id: i64) -> RxResult<DoctorProfile> {
    conn.query_row(
        &format!("SELECT {} FROM doctor_profiles WHERE doctor_id = ?1", PROFILE_COLUMNS),
        [doctor_id],
        profile_from_row,
    )
    .optional()?
    .ok_or_else(|| RxError::not_found("doctor", doctor_id.to_string()))
}

/// Store for doctor accounts and their profiles.
#[derive(Clone, Debug)]
pub struct DoctorStore {
    db: Database,
}

impl DoctorStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the doctor for `principal`, registering them on first sight.
    ///
    /// Registration inserts the doctor and an empty profile (with `full_name` set to the
    /// principal's name) in one transaction. Concurrent first requests for the same email
    /// resolve to the same row.
    ///
    /// # Errors
    ///
    /// Returns [`RxError::Unauthorized`] if the principal has no email or the account has been
    /// deactivated.
    pub fn resolve_or_register(&self, principal: &Principal) -> RxResult<Doctor> {
        let email = principal.email.trim().to_ascii_lowercase();
        if email.is_empty() {
            return Err(RxError::Unauthorized("principal has no email".into()));
        }
        let name = match principal.name.trim() {
            "" => email.clone(),
            n => n.to_string(),
        };

        let doctor = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO doctors (email, name, profile_picture, provider, provider_id,
                     is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
                 ON CONFLICT(email) DO NOTHING",
                params![
                    email,
                    name,
                    principal.picture,
                    principal.provider.as_deref().unwrap_or("google"),
                    principal.provider_id,
                    Utc::now(),
                ],
            )?;

            let doctor = tx.query_row(
                &format!("SELECT {} FROM doctors WHERE email = ?1", DOCTOR_COLUMNS),
                [&email],
                doctor_from_row,
            )?;
            ensure_profile(&tx, doctor.id)?;
            tx.commit()?;

            if inserted > 0 {
                tracing::info!("registered doctor {} ({})", doctor.id, doctor.email);
            }
            Ok(doctor)
        })?;

        if !doctor.is_active {
            return Err(RxError::Unauthorized(format!(
                "doctor account {} is deactivated",
                doctor.email
            )));
        }
        Ok(doctor)
    }

    pub fn get(&self, doctor_id: i64) -> RxResult<Doctor> {
        self.db.with_conn(|conn| {
            select_doctor(conn, doctor_id)?
                .ok_or_else(|| RxError::not_found("doctor", doctor_id.to_string()))
        })
    }

    /// Returns the doctor's profile, creating an empty one if it is missing.
    pub fn get_profile(&self, doctor_id: i64) -> RxResult<DoctorProfile> {
        self.db.with_conn(|conn| {
            ensure_profile(conn, doctor_id)?;
            select_profile(conn, doctor_id)
        })
    }

    /// Applies the fields set in `update` and returns the resulting profile.
    pub fn update_profile(&self, doctor_id: i64, update: &ProfileUpdate) -> RxResult<DoctorProfile> {
        if update.experience_years.is_some_and(|y| y < 0) {
            return Err(RxError::validation(
                "experience_years",
                "experience cannot be negative",
            ));
        }

        self.db.with_conn(|conn| {
            ensure_profile(conn, doctor_id)?;
            conn.execute(
                "UPDATE doctor_profiles SET
                     full_name = COALESCE(?2, full_name),
                     designation = COALESCE(?3, designation),
                     specialization = COALESCE(?4, specialization),
                     license_number = COALESCE(?5, license_number),
                     experience_years = COALESCE(?6, experience_years),
                     phone = COALESCE(?7, phone),
                     hospital_name = COALESCE(?8, hospital_name),
                     hospital_address = COALESCE(?9, hospital_address),
                     hospital_phone = COALESCE(?10, hospital_phone),
                     hospital_email = COALESCE(?11, hospital_email),
                     education = COALESCE(?12, education),
                     certifications = COALESCE(?13, certifications),
                     signature = COALESCE(?14, signature),
                     updated_at = ?15
                 WHERE doctor_id = ?1",
                params![
                    doctor_id,
                    update.full_name,
                    update.designation,
                    update.specialization,
                    update.license_number,
                    update.experience_years,
                    update.phone,
                    update.hospital_name,
                    update.hospital_address,
                    update.hospital_phone,
                    update.hospital_email,
                    update.education,
                    update.certifications,
                    update.signature,
                    Utc::now(),
                ],
            )?;
            select_profile(conn, doctor_id)
        })
    }

    /// Records the blob key of an uploaded hospital logo.
    pub fn set_hospital_logo(&self, doctor_id: i64, path: &str) -> RxResult<DoctorProfile> {
        self.db.with_conn(|conn| {
            ensure_profile(conn, doctor_id)?;
            conn.execute(
                "UPDATE doctor_profiles SET hospital_logo_path = ?2, updated_at = ?3
                 WHERE doctor_id = ?1",
                params![doctor_id, path, Utc::now()],
            )?;
            select_profile(conn, doctor_id)
        })
    }
}
