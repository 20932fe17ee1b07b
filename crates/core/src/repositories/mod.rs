//! Relational store repositories.
//!
//! Each store wraps the shared [`crate::db::Database`] handle. Row-level helpers that must run
//! inside a caller's transaction take a plain `&Connection` (a `Transaction` derefs to one) so
//! multi-table writes can be composed into a single atomic unit.

pub mod doctors;
pub mod patients;
pub mod prescriptions;

use rusqlite::types::Type;
use rusqlite::Row;
use rxpad_ident::{ExternalId, IdPrefix};

/// Reads an external identifier column, rejecting malformed stored values.
pub(crate) fn external_id(row: &Row<'_>, column: &str, prefix: IdPrefix) -> rusqlite::Result<ExternalId> {
    let raw: String = row.get(column)?;
    ExternalId::parse(prefix, &raw).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

/// Escapes `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
