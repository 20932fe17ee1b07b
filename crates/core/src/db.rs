//! SQLite connection handling and schema migrations.
//!
//! The relational store is a single SQLite file shared behind a mutex. Statements are short and
//! the server moves every store call onto a blocking thread, so one connection is enough.

use crate::{RxError, RxResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Versioned schema migrations, applied in order.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../migrations/001_initial.sql"))];

/// Shared handle to the relational store.
#[derive(Clone, Debug)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and runs pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `RxError` if the file cannot be opened or a migration fails.
    pub fn open(path: &Path) -> RxResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database (for tests and dry runs).
    pub fn open_in_memory() -> RxResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> RxResult<Self> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> RxResult<T>) -> RxResult<T> {
        let mut conn = self.conn.lock().map_err(|_| RxError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Returns the applied schema version (0 for an empty database).
    pub fn schema_version(&self) -> RxResult<i64> {
        self.with_conn(|conn| Ok(current_version(conn)))
    }
}

fn configure_pragmas(conn: &Connection) -> RxResult<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout=5000;",
    )?;
    Ok(())
}

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> RxResult<()> {
    let current = current_version(conn);

    for (version, sql) in MIGRATIONS {
        if *version > current {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| RxError::MigrationFailed {
                    version: *version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Current schema version, 0 if the version table does not exist yet.
fn current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory_applies_schema() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);

        let tables: Vec<String> = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .unwrap();

        assert_eq!(
            tables,
            vec![
                "doctor_profiles",
                "doctors",
                "patients",
                "prescriptions",
                "schema_version"
            ]
        );
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| run_migrations(conn)).unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = Database::open_in_memory().unwrap();
        let fk: i64 = db
            .with_conn(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_open_file_persists_between_handles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("rx.db");

        Database::open(&path).unwrap();
        let reopened = Database::open(&path).unwrap();

        assert!(path.is_file());
        assert_eq!(reopened.schema_version().unwrap(), 1);
    }
}
