//! Request authentication.
//!
//! The identity provider sits in front of the service. It forwards the shared API key together
//! with the authenticated principal in plain headers; this module only checks and reads them.

use rxpad_core::Principal;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const EMAIL_HEADER: &str = "x-auth-email";
pub const NAME_HEADER: &str = "x-auth-name";
pub const PROVIDER_HEADER: &str = "x-auth-provider";
pub const PROVIDER_ID_HEADER: &str = "x-auth-provider-id";
pub const PICTURE_HEADER: &str = "x-auth-picture";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing x-api-key header")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Missing authenticated principal ({0} header)")]
    MissingPrincipal(&'static str),
}

/// Validates the provided API key against the configured one.
///
/// Returns `Ok(())` if the key matches, or an error if it is missing or wrong.
pub fn validate_api_key(expected: &str, provided: Option<&str>) -> Result<(), AuthError> {
    let provided = provided.ok_or(AuthError::MissingApiKey)?;
    if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reads the forwarded principal through `header`, which returns a header's value by name.
///
/// # Errors
///
/// Returns [`AuthError::MissingPrincipal`] if no email is forwarded.
pub fn principal_from_lookup(header: impl Fn(&str) -> Option<String>) -> Result<Principal, AuthError> {
    let present = |name: &str| header(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let email = present(EMAIL_HEADER).ok_or(AuthError::MissingPrincipal(EMAIL_HEADER))?;
    Ok(Principal {
        name: present(NAME_HEADER).unwrap_or_default(),
        email,
        provider: present(PROVIDER_HEADER),
        provider_id: present(PROVIDER_ID_HEADER),
        picture: present(PICTURE_HEADER),
    })
}
