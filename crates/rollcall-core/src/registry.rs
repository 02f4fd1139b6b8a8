//! Session registry: create, resolve and close attendance sessions

use rollcall_api::{Session, SessionDescriptor, SessionStatus};
use rollcall_config::SessionPolicy;
use rollcall_store::{AuditEvent, AuditEventType, Store};
use rollcall_util::{AttendanceError, Result, SessionId};
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the lifecycle of sessions
pub struct SessionRegistry {
    store: Arc<dyn Store>,
    policy: SessionPolicy,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn Store>, policy: SessionPolicy) -> Self {
        Self { store, policy }
    }

    /// Open a new session for a class meeting.
    ///
    /// Every descriptive field must be non-blank; values are stored trimmed.
    /// The optional lecture/lab tag is dropped when blank.
    pub async fn create(&self, descriptor: SessionDescriptor) -> Result<Session> {
        let missing = descriptor.key.missing_fields();
        if !missing.is_empty() {
            return Err(AttendanceError::validation(format!(
                "missing required session fields: {}",
                missing.join(", ")
            )));
        }

        let descriptor = SessionDescriptor {
            key: descriptor.key.trimmed(),
            lecture_or_lab: descriptor
                .lecture_or_lab
                .map(|kind| kind.trim().to_string())
                .filter(|kind| !kind.is_empty()),
        };

        let session = Session {
            session_id: SessionId::generate(),
            descriptor,
            created_at: rollcall_util::now(),
            status: SessionStatus::Open,
        };

        self.store.insert_session(&session)?;

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::SessionCreated {
            session_id: session.session_id.clone(),
            key: session.key().clone(),
        }));

        info!(
            session_id = %session.session_id,
            class_name = %session.key().class_name,
            subject = %session.key().subject,
            date = %session.key().date,
            "Session created"
        );

        Ok(session)
    }

    /// Resolve an identifier to an open session.
    ///
    /// Unknown identifiers are `NotFound`. Closed sessions, and open ones
    /// older than the configured lifetime, are `Expired`. No side effects.
    pub async fn lookup(&self, session_id: &SessionId) -> Result<Session> {
        let session = self
            .store
            .get_session(session_id)?
            .ok_or_else(|| AttendanceError::NotFound(session_id.clone()))?;

        if !session.is_open() {
            debug!(session_id = %session_id, "Lookup of closed session");
            return Err(AttendanceError::Expired(session_id.clone()));
        }

        if let Some(max_age) = self.policy.max_age {
            let age = rollcall_util::elapsed_between(&session.created_at, &rollcall_util::now());
            if age > max_age {
                debug!(
                    session_id = %session_id,
                    age = %rollcall_util::format_duration(age),
                    "Lookup of session past its lifetime"
                );
                return Err(AttendanceError::Expired(session_id.clone()));
            }
        }

        Ok(session)
    }

    /// Resolve whatever the student scanned or typed: a bare identifier,
    /// the QR payload, or the shared link.
    pub async fn resolve(&self, token: &str) -> Result<Session> {
        let session_id = SessionId::from_shared(token)?;
        self.lookup(&session_id).await
    }

    /// Stop accepting check-ins. Idempotent.
    pub async fn close(&self, session_id: &SessionId) -> Result<()> {
        let session = self
            .store
            .get_session(session_id)?
            .ok_or_else(|| AttendanceError::NotFound(session_id.clone()))?;

        if !session.is_open() {
            debug!(session_id = %session_id, "Session already closed");
            return Ok(());
        }

        if !self
            .store
            .set_session_status(session_id, SessionStatus::Closed)?
        {
            return Err(AttendanceError::NotFound(session_id.clone()));
        }

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::SessionClosed {
            session_id: session_id.clone(),
        }));

        info!(session_id = %session_id, "Session closed");
        Ok(())
    }
}
