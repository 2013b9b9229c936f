//! Repository Module
//!
//! Plain async functions over the SQLite pool (or an open transaction).
//! Compound loyalty writes are orchestrated by `crate::loyalty::service`,
//! which owns the transaction boundaries.

pub mod history;
pub mod member;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {message}")]
    Duplicate {
        message: String,
        store_code: Option<String>,
    },

    #[error("Constraint violated: {message}")]
    Constraint {
        message: String,
        store_code: Option<String>,
    },

    /// Conditional update matched no row although the row exists
    #[error("Stale write: {0}")]
    Stale(String),

    /// Busy or locked database, pool exhaustion, I/O; safe to retry
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl RepoError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::Transient(_))
    }
}

/// SQLite primary result codes for a busy or locked database
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound("Row not found".into()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                let store_code = db_err.code().map(|c| c.into_owned());
                match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => {
                        RepoError::Duplicate { message, store_code }
                    }
                    sqlx::error::ErrorKind::CheckViolation
                    | sqlx::error::ErrorKind::ForeignKeyViolation
                    | sqlx::error::ErrorKind::NotNullViolation => {
                        RepoError::Constraint { message, store_code }
                    }
                    _ if is_busy_code(store_code.as_deref()) => RepoError::Transient(message),
                    _ => RepoError::Database(message),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
                RepoError::Transient(err.to_string())
            }
            other => RepoError::Database(other.to_string()),
        }
    }
}

/// Extended result codes carry the primary code in their low byte
fn is_busy_code(code: Option<&str>) -> bool {
    let Some(code) = code.and_then(|c| c.parse::<u32>().ok()) else {
        return false;
    };
    let primary = (code & 0xff).to_string();
    primary == SQLITE_BUSY || primary == SQLITE_LOCKED
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Build a `LIKE` pattern that matches `fragment` literally anywhere.
///
/// Pair with `ESCAPE '\'` in the query.
pub fn contains_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
