//! Helpers shared by the SeaORM repositories

use sea_orm::{DbErr, SqlErr};

use crate::domain::{DomainError, DomainResult};

pub(super) fn db_err(e: DbErr) -> DomainError {
    DomainError::Repository(format!("Database error: {}", e))
}

pub(super) fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// SQLite `SQLITE_BUSY` / `SQLITE_LOCKED` or a Postgres serialization failure.
pub(super) fn is_lock_contention(e: &DbErr) -> bool {
    let text = e.to_string();
    text.contains("database is locked")
        || text.contains("database table is locked")
        || text.contains("could not serialize access")
}

/// Error mapping for statements inside a write transaction. A writer that
/// lost the lock to a concurrent transaction gets a retryable conflict.
pub(super) fn write_err(e: DbErr) -> DomainError {
    if is_lock_contention(&e) {
        DomainError::Conflict(format!("concurrent write in progress: {}", e))
    } else {
        db_err(e)
    }
}

/// Decode a stored enum column, treating unknown values as corrupt rows.
pub(super) fn decode<T>(
    column: &'static str,
    raw: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> DomainResult<T> {
    parse(raw).ok_or_else(|| {
        DomainError::Repository(format!("unrecognised {} value '{}' in database", column, raw))
    })
}
