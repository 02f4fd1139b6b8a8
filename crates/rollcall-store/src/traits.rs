//! Store trait definitions

use chrono::{DateTime, Local};
use rollcall_api::{
    AttendanceRecord, CaptureFormat, DescriptiveKey, IdentityFields, Session, SessionStatus,
};
use rollcall_util::{CheckInField, RecordId, SessionId};

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Sessions

    /// Persist a freshly created session
    fn insert_session(&self, session: &Session) -> StoreResult<()>;

    /// Load a session by identifier
    fn get_session(&self, session_id: &SessionId) -> StoreResult<Option<Session>>;

    /// Update the status of a session. Returns false if the session is unknown.
    fn set_session_status(&self, session_id: &SessionId, status: SessionStatus)
    -> StoreResult<bool>;

    // Check-ins

    /// Record a check-in. Fails with `StoreError::DuplicateCheckIn` if the
    /// session already holds the enrollment number or the email, and with
    /// `StoreError::SessionClosed` if the session has been closed.
    fn insert_check_in(&self, check_in: &NewCheckIn) -> StoreResult<AttendanceRecord>;

    /// Which identity field, if any, the session already holds.
    /// Enrollment number is reported ahead of email.
    fn find_check_in_conflict(
        &self,
        session_id: &SessionId,
        enrollment_number: &str,
        email: &str,
    ) -> StoreResult<Option<CheckInField>>;

    /// All check-ins for a descriptive key, in check-in order
    fn list_check_ins(&self, key: &DescriptiveKey) -> StoreResult<Vec<AttendanceRecord>>;

    /// Close every session with the key and delete its check-ins, atomically
    fn reset_roster(&self, key: &DescriptiveKey) -> StoreResult<RosterReset>;

    /// Fetch the selfie stored with a record
    fn get_selfie(&self, record_id: &RecordId) -> StoreResult<Option<Selfie>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// A check-in about to be written
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub session_id: SessionId,
    /// Copied from the session so rosters can be addressed by key alone
    pub key: DescriptiveKey,
    pub identity: IdentityFields,
    pub timestamp: DateTime<Local>,
    pub selfie: Selfie,
}

/// Outcome of `Store::reset_roster`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterReset {
    pub deleted_count: usize,
    pub sessions_closed: usize,
}

/// Encoded image captured at check-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selfie {
    pub format: CaptureFormat,
    pub bytes: Vec<u8>,
}
