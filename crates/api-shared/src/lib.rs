//! # API Shared
//!
//! Shared utilities and definitions for the RxPad REST API.
//!
//! Contains:
//! - Request and response bodies (`dto` module), documented for OpenAPI
//! - Shared services like `HealthService`
//! - Authentication utilities: API key check and principal extraction
//!
//! Kept free of any HTTP framework so the same types back the server and its tests.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{principal_from_lookup, validate_api_key, AuthError};
pub use dto::*;
pub use health::HealthService;
