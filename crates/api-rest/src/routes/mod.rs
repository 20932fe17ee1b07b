//! HTTP handlers, grouped by resource.

pub mod blobs;
pub mod dashboard;
pub mod health;
pub mod patients;
pub mod prescriptions;
pub mod profile;
