//! Audit event types

use chrono::{DateTime, Local};
use rollcall_api::DescriptiveKey;
use rollcall_util::{RecordId, SessionId};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Instructor opened a session
    SessionCreated {
        session_id: SessionId,
        key: DescriptiveKey,
    },

    /// Session stopped accepting check-ins
    SessionClosed { session_id: SessionId },

    /// Check-in accepted
    CheckInRecorded {
        session_id: SessionId,
        record_id: RecordId,
        enrollment_number: String,
    },

    /// Check-in refused at authentication or submission
    CheckInRejected {
        session_id: SessionId,
        enrollment_number: String,
        reason: String,
    },

    /// Roster downloaded as a spreadsheet
    AttendanceExported {
        key: DescriptiveKey,
        record_count: usize,
    },

    /// Roster cleared
    AttendanceReset {
        key: DescriptiveKey,
        deleted_count: usize,
        sessions_closed: usize,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: rollcall_util::now(),
            event,
        }
    }
}
