//! Response shapes returned to instructor and student front ends

use chrono::{DateTime, Local};
use rollcall_util::{AttendanceError, SessionId};
use serde::{Deserialize, Serialize};

use crate::{AttendanceRecord, DescriptiveKey, Session, SessionStatus, API_VERSION};

/// Result of opening a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: SessionId,
    /// Text encoded into the QR code
    pub qr_payload: String,
    /// Relative link a student can open directly
    pub link: String,
    /// The QR code as a `data:image/png;base64,…` URL
    pub qr_code: String,
    /// Identifier to type in by hand
    pub manual_code: String,
    pub message: String,
}

/// Session details shown to a student after resolving an identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub key: DescriptiveKey,
    pub lecture_or_lab: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Local>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            key: session.descriptor.key.clone(),
            lecture_or_lab: session.descriptor.lecture_or_lab.clone(),
            status: session.status,
            created_at: session.created_at,
        }
    }
}

/// Successful check-in submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInReceipt {
    pub message: String,
    pub record: AttendanceRecord,
}

/// Roster for one descriptive key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub total_attendance: usize,
    /// In check-in order
    pub records: Vec<AttendanceRecord>,
    /// Echo of the key that was queried
    pub query: DescriptiveKey,
}

impl AttendanceReport {
    pub fn new(query: DescriptiveKey, records: Vec<AttendanceRecord>) -> Self {
        Self {
            total_attendance: records.len(),
            records,
            query,
        }
    }
}

/// Outcome of clearing a roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetReport {
    pub message: String,
    pub deleted_count: usize,
}

impl ResetReport {
    pub fn new(deleted_count: usize) -> Self {
        Self {
            message: format!("Successfully reset {} attendance records", deleted_count),
            deleted_count,
        }
    }
}

/// Spreadsheet produced by an export
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// MIME type of `.xlsx` workbooks
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub api_version: u32,
    pub store_ok: bool,
    pub timestamp: DateTime<Local>,
}

impl HealthStatus {
    pub fn new(store_ok: bool) -> Self {
        Self {
            api_version: API_VERSION,
            store_ok,
            timestamp: rollcall_util::now(),
        }
    }
}

/// Error codes surfaced to front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    SessionNotFound,
    SessionExpired,
    DomainMismatch,
    MissingField,
    SessionClosed,
    DeviceUnavailable,
    IncompleteAttempt,
    AlreadySubmitted,
    DuplicateCheckIn,
    Transient,
}

impl From<&AttendanceError> for ErrorCode {
    fn from(err: &AttendanceError) -> Self {
        match err {
            AttendanceError::Validation(_) => ErrorCode::InvalidRequest,
            AttendanceError::NotFound(_) => ErrorCode::SessionNotFound,
            AttendanceError::Expired(_) => ErrorCode::SessionExpired,
            AttendanceError::DomainMismatch { .. } => ErrorCode::DomainMismatch,
            AttendanceError::MissingField(_) => ErrorCode::MissingField,
            AttendanceError::SessionClosed(_) => ErrorCode::SessionClosed,
            AttendanceError::DeviceUnavailable(_) => ErrorCode::DeviceUnavailable,
            AttendanceError::IncompleteAttempt(_) => ErrorCode::IncompleteAttempt,
            AttendanceError::AlreadySubmitted => ErrorCode::AlreadySubmitted,
            AttendanceError::DuplicateCheckIn { .. } => ErrorCode::DuplicateCheckIn,
            AttendanceError::Transient(_) => ErrorCode::Transient,
        }
    }
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    /// Whether repeating the failed step may succeed
    pub retryable: bool,
}

impl From<&AttendanceError> for ErrorInfo {
    fn from(err: &AttendanceError) -> Self {
        Self {
            code: err.into(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
