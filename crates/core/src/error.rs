use crate::artifacts::ArchiveError;
use crate::render::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum RxError {
    /// Malformed caller input; `field` names the offending field
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A generated external identifier collided with an existing row
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("archive failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration v{version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("database connection lock poisoned")]
    LockPoisoned,

    #[error("failed to serialize record field: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identifier: {0}")]
    Identifier(#[from] rxpad_ident::IdentError),

    #[error("blob store error: {0}")]
    Blob(#[from] rxpad_files::BlobError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RxError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RxError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        RxError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Maps an insert failure, turning unique-constraint violations into [`RxError::Conflict`].
    pub(crate) fn from_insert(err: rusqlite::Error, what: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                RxError::Conflict(format!("{} already exists", what))
            }
            _ => RxError::Database(err),
        }
    }
}

pub type RxResult<T> = std::result::Result<T, RxError>;
