//! Error taxonomy for attendance operations

use std::fmt;
use thiserror::Error;

use crate::SessionId;

/// Identity field that must be unique within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckInField {
    EnrollmentNumber,
    Email,
}

impl fmt::Display for CheckInField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckInField::EnrollmentNumber => write!(f, "enrollment number"),
            CheckInField::Email => write!(f, "email"),
        }
    }
}

/// Every way a session or check-in operation can fail.
///
/// Each variant is distinct so callers can render a precise message.
/// Nothing here is fatal to the process; every failure is recoverable by
/// correcting input, repeating the failed step, or starting a fresh attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Session expired: {0}")]
    Expired(SessionId),

    #[error("Email '{email}' is not an @{domain} address")]
    DomainMismatch { email: String, domain: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Session is closed: {0}")]
    SessionClosed(SessionId),

    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Check-in incomplete: {0}")]
    IncompleteAttempt(String),

    #[error("Check-in already submitted")]
    AlreadySubmitted,

    #[error("Attendance already marked in session {session_id} for {field} '{value}'")]
    DuplicateCheckIn {
        session_id: SessionId,
        /// Which unique field collided
        field: CheckInField,
        /// The value already on the roster
        value: String,
    },

    #[error("Request failed: {0}")]
    Transient(String),
}

impl AttendanceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable(msg.into())
    }

    pub fn incomplete(msg: impl Into<String>) -> Self {
        Self::IncompleteAttempt(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Device and backend failures may be retried by explicitly repeating
    /// the failed step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_) | Self::Transient(_))
    }

    /// The attempt must be discarded; no retry path exists.
    pub fn is_terminal_for_attempt(&self) -> bool {
        matches!(self, Self::DuplicateCheckIn { .. })
    }

    /// Input or ordering problems the caller has to correct before trying
    /// again (fix a field, complete a missing step).
    pub fn requires_correction(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::MissingField(_)
                | Self::DomainMismatch { .. }
                | Self::IncompleteAttempt(_)
                | Self::AlreadySubmitted
        )
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
