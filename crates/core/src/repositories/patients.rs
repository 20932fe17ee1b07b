//! Patient records.
//!
//! Patients are shared across the practice rather than owned by a doctor. They are created
//! either directly or inline as part of prescription creation, in which case the insert runs
//! inside the prescription's transaction via [`insert_patient`].

use crate::constants::PAGE_SIZE;
use crate::db::Database;
use crate::models::{page_offset, NewPatient, Page, Patient};
use crate::repositories::{external_id, like_pattern};
use crate::{RxError, RxResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rxpad_ident::{ExternalId, IdPrefix, IdentifierSource};
use rxpad_types::NonEmptyText;
use std::sync::Arc;

const PATIENT_COLUMNS: &str = "id, patient_id, name, age, gender, phone, email, address, \
     emergency_contact, blood_group, allergies, medical_history, is_starred, created_at, updated_at";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get("id")?,
        patient_id: external_id(row, "patient_id", IdPrefix::Patient)?,
        name: row.get("name")?,
        age: row.get("age")?,
        gender: row.get("gender")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        address: row.get("address")?,
        emergency_contact: row.get("emergency_contact")?,
        blood_group: row.get("blood_group")?,
        allergies: row.get("allergies")?,
        medical_history: row.get("medical_history")?,
        is_starred: row.get("is_starred")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Checks a new patient before anything is written.
///
/// `field_prefix` is prepended to reported field names (e.g. `patient_info.`) so callers see
/// the field as they submitted it.
pub(crate) fn validate_new_patient(new: &NewPatient, field_prefix: &str) -> RxResult<NonEmptyText> {
    let name = NonEmptyText::new(&new.name).map_err(|e| {
        RxError::validation(format!("{}name", field_prefix), e.to_string())
    })?;
    if new.age < 0 {
        return Err(RxError::validation(
            format!("{}age", field_prefix),
            "age cannot be negative",
        ));
    }
    Ok(name)
}

/// Inserts a validated patient and returns its internal key.
///
/// # Errors
///
/// Returns [`RxError::Conflict`] if `patient_id` is already taken.
pub(crate) fn insert_patient(
    conn: &Connection,
    patient_id: &ExternalId,
    name: &NonEmptyText,
    new: &NewPatient,
    now: DateTime<Utc>,
) -> RxResult<i64> {
    conn.execute(
        "INSERT INTO patients (patient_id, name, age, gender, phone, email, address,
             emergency_contact, blood_group, allergies, medical_history, is_starred,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?12)",
        params![
            patient_id.as_str(),
            name.as_str(),
            new.age,
            new.gender,
            new.phone,
            new.email,
            new.address,
            new.emergency_contact,
            new.blood_group,
            new.allergies,
            new.medical_history,
            now,
        ],
    )
    .map_err(|e| RxError::from_insert(e, &format!("patient {}", patient_id)))?;

    Ok(conn.last_insert_rowid())
}

/// Looks up a patient's internal key by external identifier.
pub(crate) fn find_internal_id(conn: &Connection, patient_id: &str) -> RxResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM patients WHERE patient_id = ?1",
            [patient_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Store for patient records.
#[derive(Clone)]
pub struct PatientStore {
    db: Database,
    ids: Arc<dyn IdentifierSource>,
}

impl PatientStore {
    pub fn new(db: Database, ids: Arc<dyn IdentifierSource>) -> Self {
        Self { db, ids }
    }

    /// Creates a standalone patient with a freshly generated `PT` identifier.
    ///
    /// # Errors
    ///
    /// Returns `RxError` if:
    /// - the name is empty or the age negative ([`RxError::Validation`])
    /// - the generated identifier collides with an existing one ([`RxError::Conflict`])
    pub fn create(&self, new: NewPatient) -> RxResult<Patient> {
        let name = validate_new_patient(&new, "")?;
        let patient_id = self.ids.next_id(IdPrefix::Patient);

        let id = self
            .db
            .with_conn(|conn| insert_patient(conn, &patient_id, &name, &new, Utc::now()))?;

        tracing::info!("created patient {}", patient_id);
        self.get_by_internal_id(id)
    }

    /// Fetches a patient by external identifier.
    pub fn get(&self, patient_id: &str) -> RxResult<Patient> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM patients WHERE patient_id = ?1", PATIENT_COLUMNS),
                [patient_id],
                patient_from_row,
            )
            .optional()?
            .ok_or_else(|| RxError::not_found("patient", patient_id))
        })
    }

    pub fn get_by_internal_id(&self, id: i64) -> RxResult<Patient> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM patients WHERE id = ?1", PATIENT_COLUMNS),
                [id],
                patient_from_row,
            )
            .optional()?
            .ok_or_else(|| RxError::not_found("patient", id.to_string()))
        })
    }

    /// Searches patients by substring of name, identifier or phone, newest first.
    ///
    /// # Arguments
    ///
    /// * `query` - Case-insensitive substring; `None` or blank matches everyone
    /// * `starred_only` - Restrict to starred patients
    /// * `page` - 1-based page number; 0 is treated as 1
    pub fn search(&self, query: Option<&str>, starred_only: bool, page: u32) -> RxResult<Page<Patient>> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(like_pattern);
        let (page, offset) = page_offset(page, PAGE_SIZE);

        const FILTER: &str = "(?1 IS NULL
                  OR name LIKE ?1 ESCAPE '\\'
                  OR patient_id LIKE ?1 ESCAPE '\\'
                  OR phone LIKE ?1 ESCAPE '\\')
             AND (?2 = 0 OR is_starred = 1)";

        self.db.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM patients WHERE {}", FILTER),
                params![pattern, starred_only],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM patients WHERE {}
                 ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4",
                PATIENT_COLUMNS, FILTER
            ))?;
            let items = stmt
                .query_map(
                    params![pattern, starred_only, PAGE_SIZE, offset],
                    patient_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page {
                page,
                per_page: PAGE_SIZE,
                total: u64::try_from(total).unwrap_or(0),
                items,
            })
        })
    }

    /// Flips a patient's starred flag and returns the new value.
    pub fn toggle_star(&self, patient_id: &str) -> RxResult<bool> {
        self.db.with_conn(|conn| {
            let starred: Option<bool> = conn
                .query_row(
                    "UPDATE patients SET is_starred = NOT is_starred, updated_at = ?2
                     WHERE patient_id = ?1 RETURNING is_starred",
                    params![patient_id, Utc::now()],
                    |row| row.get(0),
                )
                .optional()?;
            starred.ok_or_else(|| RxError::not_found("patient", patient_id))
        })
    }

    pub fn count(&self) -> RxResult<u64> {
        self.count_where("1 = 1")
    }

    pub fn count_starred(&self) -> RxResult<u64> {
        self.count_where("is_starred = 1")
    }

    fn count_where(&self, predicate: &str) -> RxResult<u64> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM patients WHERE {}", predicate),
                [],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
    }

    /// Most recently created patients.
    pub fn recent(&self, limit: u32) -> RxResult<Vec<Patient>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM patients ORDER BY created_at DESC, id DESC LIMIT ?1",
                PATIENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([limit], patient_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedIdentifiers;
    use rxpad_ident::RandomIdentifiers;

    fn store() -> PatientStore {
        PatientStore::new(Database::open_in_memory().unwrap(), Arc::new(RandomIdentifiers))
    }

    fn named(name: &str) -> NewPatient {
        NewPatient {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_assigns_pt_identifier() {
        let store = store();
        let patient = store
            .create(NewPatient {
                name: "  Alice Johnson ".into(),
                age: 35,
                gender: "Female".into(),
                ..Default::default()
            })
            .unwrap();

        assert!(ExternalId::is_well_formed(IdPrefix::Patient, patient.patient_id.as_str()));
        assert_eq!(patient.name, "Alice Johnson");
        assert_eq!(patient.age, 35);
        assert!(!patient.is_starred);
        assert_eq!(store.get(patient.patient_id.as_str()).unwrap(), patient);
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let store = store();
        let err = store.create(named("   ")).unwrap_err();
        assert!(matches!(err, RxError::Validation { ref field, .. } if field == "name"));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_create_rejects_negative_age() {
        let store = store();
        let err = store
            .create(NewPatient {
                name: "Bob".into(),
                age: -1,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, RxError::Validation { ref field, .. } if field == "age"));
    }

    #[test]
    fn test_identifier_collision_is_conflict() {
        let fixed = ExternalId::parse(IdPrefix::Patient, "PT20250101ABCD1234").unwrap();
        let ids = Arc::new(FixedIdentifiers::new(vec![fixed.clone(), fixed]));
        let store = PatientStore::new(Database::open_in_memory().unwrap(), ids);

        store.create(named("First")).unwrap();
        let err = store.create(named("Second")).unwrap_err();

        assert!(matches!(err, RxError::Conflict(_)));
        assert_eq!(store.get("PT20250101ABCD1234").unwrap().name, "First");
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = store();
        assert!(matches!(
            store.get("PT20250101FFFFFFFF"),
            Err(RxError::NotFound { entity: "patient", .. })
        ));
    }

    #[test]
    fn test_search_matches_name_id_and_phone() {
        let store = store();
        let alice = store
            .create(NewPatient {
                name: "Alice Johnson".into(),
                phone: "555-0100".into(),
                ..Default::default()
            })
            .unwrap();
        store
            .create(NewPatient {
                name: "Bob Smith".into(),
                phone: "555-0199".into(),
                ..Default::default()
            })
            .unwrap();

        let by_name = store.search(Some("alice"), false, 1).unwrap();
        assert_eq!(by_name.total, 1);
        assert_eq!(by_name.items[0].id, alice.id);

        let by_id = store.search(Some(alice.patient_id.as_str()), false, 1).unwrap();
        assert_eq!(by_id.items.len(), 1);

        let by_phone = store.search(Some("555-01"), false, 1).unwrap();
        assert_eq!(by_phone.total, 2);

        let everyone = store.search(Some("  "), false, 1).unwrap();
        assert_eq!(everyone.total, 2);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let store = store();
        store.create(named("Alice")).unwrap();
        assert_eq!(store.search(Some("%"), false, 1).unwrap().total, 0);
        assert_eq!(store.search(Some("_"), false, 1).unwrap().total, 0);
    }

    #[test]
    fn test_search_paginates_newest_first() {
        let store = store();
        for i in 0..(PAGE_SIZE + 5) {
            store.create(named(&format!("Patient {i}"))).unwrap();
        }

        let first = store.search(None, false, 1).unwrap();
        let second = store.search(None, false, 2).unwrap();

        assert_eq!(first.total, u64::from(PAGE_SIZE + 5));
        assert_eq!(first.items.len(), PAGE_SIZE as usize);
        assert_eq!(second.items.len(), 5);
        assert_eq!(first.items[0].name, format!("Patient {}", PAGE_SIZE + 4));
        assert_eq!(second.items[4].name, "Patient 0");
        assert!(first.has_next());
        assert!(!second.has_next());
    }

    #[test]
    fn test_toggle_star_and_starred_filter() {
        let store = store();
        let alice = store.create(named("Alice")).unwrap();
        store.create(named("Bob")).unwrap();

        assert!(store.toggle_star(alice.patient_id.as_str()).unwrap());
        assert_eq!(store.count_starred().unwrap(), 1);

        let starred = store.search(None, true, 1).unwrap();
        assert_eq!(starred.items.len(), 1);
        assert_eq!(starred.items[0].name, "Alice");

        assert!(!store.toggle_star(alice.patient_id.as_str()).unwrap());
        assert_eq!(store.count_starred().unwrap(), 0);
    }

    #[test]
    fn test_toggle_star_unknown_is_not_found() {
        let store = store();
        assert!(matches!(
            store.toggle_star("PT20250101ABCD1234"),
            Err(RxError::NotFound { .. })
        ));
    }

    #[test]
    fn test_recent_limits_and_orders() {
        let store = store();
        for name in ["A", "B", "C"] {
            store.create(named(name)).unwrap();
        }
        let recent: Vec<String> = store.recent(2).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(recent, vec!["C", "B"]);
        assert_eq!(store.count().unwrap(), 3);
    }
}
