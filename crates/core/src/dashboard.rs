//! Per-doctor dashboard figures.

use crate::constants::DASHBOARD_RECENT_LIMIT;
use crate::models::{Patient, PrescriptionSummary};
use crate::repositories::patients::PatientStore;
use crate::repositories::prescriptions::PrescriptionStore;
use crate::RxResult;
use serde::Serialize;

/// Counts and recent activity shown on a doctor's landing page.
///
/// Patient figures cover the whole practice; prescription figures cover only the requesting
/// doctor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_patients: u64,
    pub total_prescriptions: u64,
    pub starred_patients: u64,
    pub rare_cases: u64,
    pub recent_prescriptions: Vec<PrescriptionSummary>,
    pub recent_patients: Vec<Patient>,
}

#[derive(Clone)]
pub struct DashboardService {
    patients: PatientStore,
    prescriptions: PrescriptionStore,
}

impl DashboardService {
    pub fn new(patients: PatientStore, prescriptions: PrescriptionStore) -> Self {
        Self {
            patients,
            prescriptions,
        }
    }

    pub fn stats(&self, doctor_id: i64) -> RxResult<DashboardStats> {
        Ok(DashboardStats {
            total_patients: self.patients.count()?,
            total_prescriptions: self.prescriptions.count_for_doctor(doctor_id)?,
            starred_patients: self.patients.count_starred()?,
            rare_cases: self.prescriptions.count_rare_for_doctor(doctor_id)?,
            recent_prescriptions: self.prescriptions.recent(doctor_id, DASHBOARD_RECENT_LIMIT)?,
            recent_patients: self.patients.recent(DASHBOARD_RECENT_LIMIT)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ClinicalFields, NewPatient, PatientSelector};
    use crate::testing::register_doctor;
    use rxpad_ident::{IdentifierSource, RandomIdentifiers};
    use std::sync::Arc;

    #[test]
    fn test_stats_scope_prescriptions_to_doctor() {
        let db = Database::open_in_memory().unwrap();
        let ids: Arc<dyn IdentifierSource> = Arc::new(RandomIdentifiers);
        let patients = PatientStore::new(db.clone(), ids.clone());
        let prescriptions = PrescriptionStore::new(db.clone(), ids);
        let ada = register_doctor(&db, "ada@example.com");
        let grace = register_doctor(&db, "grace@example.com");

        for i in 0..7 {
            let rx = prescriptions
                .create(
                    ada,
                    PatientSelector::Inline(NewPatient {
                        name: format!("Patient {i}"),
                        ..Default::default()
                    }),
                    ClinicalFields {
                        is_rare_case: i % 3 == 0,
                        ..Default::default()
                    },
                )
                .unwrap();
            if i == 0 {
                let patient = patients.get_by_internal_id(rx.patient_id).unwrap();
                patients.toggle_star(patient.patient_id.as_str()).unwrap();
            }
        }
        prescriptions
            .create(
                grace,
                PatientSelector::Inline(NewPatient {
                    name: "Other".into(),
                    ..Default::default()
                }),
                ClinicalFields::default(),
            )
            .unwrap();

        let service = DashboardService::new(patients, prescriptions);
        let stats = service.stats(ada).unwrap();

        assert_eq!(stats.total_patients, 8);
        assert_eq!(stats.total_prescriptions, 7);
        assert_eq!(stats.starred_patients, 1);
        assert_eq!(stats.rare_cases, 3);
        assert_eq!(stats.recent_prescriptions.len(), DASHBOARD_RECENT_LIMIT as usize);
        assert_eq!(stats.recent_patients.len(), DASHBOARD_RECENT_LIMIT as usize);
        assert_eq!(stats.recent_patients[0].name, "Other");

        let empty = service.stats(register_doctor(&db, "new@example.com")).unwrap();
        assert_eq!(empty.total_prescriptions, 0);
        assert!(empty.recent_prescriptions.is_empty());
    }
}
