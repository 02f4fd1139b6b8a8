//! Attendance records: record, query, export, reset

use async_trait::async_trait;
use chrono::{DateTime, Local};
use rollcall_api::{
    AttendanceRecord, DescriptiveKey, ExportArtifact, IdentityFields, Session,
    XLSX_CONTENT_TYPE,
};
use rollcall_store::{
    AuditEvent, AuditEventType, NewCheckIn, RosterReset, Selfie, Store, StoreError,
};
use rollcall_util::{AttendanceError, CheckInField, RecordId, Result, SessionId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::CaptureArtifact;

/// Backend the check-in flow records into, and the instructor queries.
#[async_trait]
pub trait AttendanceQueryService: Send + Sync {
    /// Store one check-in. Fails with `DuplicateCheckIn` when the session
    /// already holds this enrollment number or email.
    async fn record(
        &self,
        session: &Session,
        identity: &IdentityFields,
        timestamp: DateTime<Local>,
        selfie: &CaptureArtifact,
    ) -> Result<AttendanceRecord>;

    /// Records for a key, in check-in order
    async fn query(&self, key: &DescriptiveKey) -> Result<Vec<AttendanceRecord>>;

    /// Delete the roster for a key and close its sessions. Returns the
    /// number of records removed; 0 when there were none.
    async fn reset(&self, key: &DescriptiveKey) -> Result<usize>;

    /// Render the roster for a key as a spreadsheet
    async fn export(&self, key: &DescriptiveKey) -> Result<ExportArtifact>;

    /// Image stored with a record
    async fn selfie(&self, record_id: &RecordId) -> Result<Option<Selfie>>;

    /// Which of the student's unique fields the session already holds
    async fn existing_check_in(
        &self,
        session_id: &SessionId,
        identity: &IdentityFields,
    ) -> Result<Option<CheckInField>>;

    /// Note a refused check-in. Best effort.
    async fn record_rejection(
        &self,
        session_id: &SessionId,
        enrollment_number: &str,
        reason: &AttendanceError,
    );
}

/// `DuplicateCheckIn` naming the field of `identity` that collided
pub fn duplicate_check_in(
    session_id: &SessionId,
    identity: &IdentityFields,
    field: CheckInField,
) -> AttendanceError {
    let value = match field {
        CheckInField::EnrollmentNumber => &identity.enrollment_number,
        CheckInField::Email => &identity.email,
    };
    AttendanceError::DuplicateCheckIn {
        session_id: session_id.clone(),
        field,
        value: value.clone(),
    }
}

/// `AttendanceQueryService` over a `Store`
pub struct StoreAttendanceService {
    store: Arc<dyn Store>,
}

impl StoreAttendanceService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn checked_key(key: &DescriptiveKey) -> Result<DescriptiveKey> {
        let missing = key.missing_fields();
        if !missing.is_empty() {
            return Err(AttendanceError::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(key.trimmed())
    }
}

#[async_trait]
impl AttendanceQueryService for StoreAttendanceService {
    async fn record(
        &self,
        session: &Session,
        identity: &IdentityFields,
        timestamp: DateTime<Local>,
        selfie: &CaptureArtifact,
    ) -> Result<AttendanceRecord> {
        let check_in = NewCheckIn {
            session_id: session.session_id.clone(),
            key: session.key().clone(),
            identity: identity.clone(),
            timestamp,
            selfie: Selfie {
                format: selfie.format(),
                bytes: selfie.bytes().to_vec(),
            },
        };

        let record = self.store.insert_check_in(&check_in).map_err(|e| match e {
            StoreError::DuplicateCheckIn(field) => {
                duplicate_check_in(&session.session_id, identity, field)
            }
            other => other.into(),
        })?;

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::CheckInRecorded {
            session_id: record.session_id.clone(),
            record_id: record.record_id.clone(),
            enrollment_number: record.enrollment_number.clone(),
        }));

        info!(
            session_id = %record.session_id,
            enrollment_number = %record.enrollment_number,
            record_id = %record.record_id,
            "Check-in recorded"
        );

        Ok(record)
    }

    async fn query(&self, key: &DescriptiveKey) -> Result<Vec<AttendanceRecord>> {
        let key = Self::checked_key(key)?;
        let records = self.store.list_check_ins(&key)?;
        debug!(count = records.len(), "Roster queried");
        Ok(records)
    }

    async fn reset(&self, key: &DescriptiveKey) -> Result<usize> {
        let key = Self::checked_key(key)?;

        let RosterReset {
            deleted_count,
            sessions_closed,
        } = self.store.reset_roster(&key)?;

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::AttendanceReset {
            key: key.clone(),
            deleted_count,
            sessions_closed,
        }));

        info!(
            class_name = %key.class_name,
            subject = %key.subject,
            date = %key.date,
            deleted_count,
            sessions_closed,
            "Attendance reset"
        );

        Ok(deleted_count)
    }

    async fn export(&self, key: &DescriptiveKey) -> Result<ExportArtifact> {
        let key = Self::checked_key(key)?;
        let records = self.store.list_check_ins(&key)?;
        let bytes = rollcall_store::render_workbook(&key, &records)?;

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::AttendanceExported {
            key: key.clone(),
            record_count: records.len(),
        }));

        info!(records = records.len(), bytes = bytes.len(), "Attendance exported");

        Ok(ExportArtifact {
            filename: key.export_filename(),
            content_type: XLSX_CONTENT_TYPE,
            bytes,
        })
    }

    async fn selfie(&self, record_id: &RecordId) -> Result<Option<Selfie>> {
        Ok(self.store.get_selfie(record_id)?)
    }

    async fn existing_check_in(
        &self,
        session_id: &SessionId,
        identity: &IdentityFields,
    ) -> Result<Option<CheckInField>> {
        Ok(self.store.find_check_in_conflict(
            session_id,
            &identity.enrollment_number,
            &identity.email,
        )?)
    }

    async fn record_rejection(
        &self,
        session_id: &SessionId,
        enrollment_number: &str,
        reason: &AttendanceError,
    ) {
        warn!(
            session_id = %session_id,
            enrollment_number = %enrollment_number,
            reason = %reason,
            "Check-in rejected"
        );

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::CheckInRejected {
            session_id: session_id.clone(),
            enrollment_number: enrollment_number.to_string(),
            reason: reason.to_string(),
        }));
    }
}
