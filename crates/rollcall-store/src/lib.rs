//! Persistence layer for rollcall
//!
//! Provides:
//! - Sessions and their open/closed status
//! - Check-ins with per-session uniqueness on enrollment number and email
//! - Selfie retention, kept apart from roster queries
//! - Audit log (append-only)
//! - Spreadsheet rendering of a roster

mod audit;
mod export;
mod sqlite;
mod traits;

pub use audit::*;
pub use export::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    /// A uniqueness constraint rejected the write
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session already holds this {0}")]
    DuplicateCheckIn(rollcall_util::CheckInField),

    #[error("Session is closed: {0}")]
    SessionClosed(rollcall_util::SessionId),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Duplicate(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for StoreError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        StoreError::Export(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Constraint violations become validation errors, everything else is
/// transient. Check-in duplicates are mapped by the caller, which knows the student.
impl From<StoreError> for rollcall_util::AttendanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionClosed(id) => rollcall_util::AttendanceError::SessionClosed(id),
            StoreError::Duplicate(_) | StoreError::DuplicateCheckIn(_) => {
                rollcall_util::AttendanceError::Validation(e.to_string())
            }
            other => rollcall_util::AttendanceError::Transient(other.to_string()),
        }
    }
}
