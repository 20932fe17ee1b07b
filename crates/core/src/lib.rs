//! # RxPad Core
//!
//! Core business logic for the RxPad prescription system.
//!
//! This crate owns the relational store and the prescription lifecycle:
//! - Patients, doctors and prescriptions in SQLite with versioned migrations
//! - HTML to PDF rendering through an external engine
//! - Archival of rendered PDFs to blob storage and signed-URL retrieval
//! - A read-only sweep that reconciles blob storage with recorded artifact paths
//!
//! **No API concerns**: authentication, HTTP servers and request DTOs belong in `api-rest` or
//! `api-shared`.
//!
//! All operations are blocking. Async callers move them onto a blocking thread.

pub mod artifacts;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod logos;
pub mod models;
pub mod render;
pub mod repositories;
pub mod services;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use artifacts::{
    artifact_filename, ArchiveError, ArchiveReconciler, ArchivedArtifact, ArtifactArchiver,
    ReconcileReport, RetrievalGateway,
};
pub use config::{open_blob_store, BlobBackend, CoreConfig};
pub use dashboard::{DashboardService, DashboardStats};
pub use db::Database;
pub use error::{RxError, RxResult};
pub use logos::HospitalLogos;
pub use models::{
    ClinicalFields, Doctor, DoctorProfile, NewPatient, Page, Patient, PatientSelector,
    Prescription, PrescriptionSummary, Principal, ProfileUpdate,
};
pub use render::{DocumentRenderer, RenderError, RenderOptions, WkhtmltopdfRenderer};
pub use repositories::doctors::DoctorStore;
pub use repositories::patients::PatientStore;
pub use repositories::prescriptions::PrescriptionStore;
pub use services::CoreServices;
