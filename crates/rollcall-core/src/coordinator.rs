//! Check-in coordinator: authentication gate, capture, at-most-once submit

use rollcall_api::{AttendanceRecord, IdentityFields, Session};
use rollcall_config::CapturePolicy;
use rollcall_device::CameraDevice;
use rollcall_util::{AttendanceError, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    AttendanceQueryService, CaptureController, EligibilityChecker, SessionRegistry,
    VerifiedIdentity, duplicate_check_in,
};

/// Where an attempt stands with respect to submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionStatus {
    NotSubmitted,
    Submitted(AttendanceRecord),
    /// The last submit failed with this error
    Failed(AttendanceError),
}

/// One student's attempt to check in to one session
pub struct CheckInAttempt {
    session: Session,
    authentication: Option<VerifiedIdentity>,
    capture: CaptureController,
    submission: SubmissionStatus,
}

impl CheckInAttempt {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_verified(&self) -> bool {
        self.authentication.is_some()
    }

    pub fn verified_identity(&self) -> Option<&VerifiedIdentity> {
        self.authentication.as_ref()
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    /// Camera controls for this attempt
    pub fn capture_mut(&mut self) -> &mut CaptureController {
        &mut self.capture
    }

    pub fn submission(&self) -> &SubmissionStatus {
        &self.submission
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.submission, SubmissionStatus::Submitted(_))
    }

    /// Walk away from the attempt; the camera is released.
    pub fn abandon(&mut self) {
        self.capture.abandon();
    }

    /// A duplicate check-in ends the attempt for good
    fn terminal_error(&self) -> Option<&AttendanceError> {
        match &self.submission {
            SubmissionStatus::Failed(e) if e.is_terminal_for_attempt() => Some(e),
            _ => None,
        }
    }
}

/// Sequences authentication, capture and submission
pub struct CheckInCoordinator {
    registry: Arc<SessionRegistry>,
    checker: EligibilityChecker,
    attendance: Arc<dyn AttendanceQueryService>,
    camera: Arc<dyn CameraDevice>,
    capture_policy: CapturePolicy,
}

impl CheckInCoordinator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        checker: EligibilityChecker,
        attendance: Arc<dyn AttendanceQueryService>,
        camera: Arc<dyn CameraDevice>,
        capture_policy: CapturePolicy,
    ) -> Self {
        Self {
            registry,
            checker,
            attendance,
            camera,
            capture_policy,
        }
    }

    /// Resolve a scanned or typed identifier and open an attempt on it
    pub async fn begin(&self, token: &str) -> Result<CheckInAttempt> {
        let session = self.registry.resolve(token).await?;
        debug!(session_id = %session.session_id, "Check-in attempt started");
        Ok(self.attempt_for(session))
    }

    /// Open an attempt on an already resolved session
    pub fn attempt_for(&self, session: Session) -> CheckInAttempt {
        CheckInAttempt {
            session,
            authentication: None,
            capture: CaptureController::new(self.camera.clone(), self.capture_policy),
            submission: SubmissionStatus::NotSubmitted,
        }
    }

    /// One-shot eligibility gate. Once verified, later calls return the
    /// cached identity without re-checking.
    pub async fn start_authentication(
        &self,
        attempt: &mut CheckInAttempt,
        identity: &IdentityFields,
    ) -> Result<VerifiedIdentity> {
        if let Some(verified) = &attempt.authentication {
            debug!(session_id = %attempt.session.session_id, "Already verified");
            return Ok(verified.clone());
        }
        if let Some(err) = attempt.terminal_error() {
            return Err(err.clone());
        }

        attempt.session = self
            .current_session(attempt, identity.enrollment_number.trim())
            .await?;

        let verified = match self.checker.verify(&attempt.session, identity) {
            Ok(verified) => verified,
            Err(e) => {
                self.attendance
                    .record_rejection(
                        &attempt.session.session_id,
                        identity.enrollment_number.trim(),
                        &e,
                    )
                    .await;
                return Err(e);
            }
        };

        if let Some(field) = self
            .attendance
            .existing_check_in(verified.session_id(), verified.identity())
            .await?
        {
            let err = duplicate_check_in(verified.session_id(), verified.identity(), field);
            self.attendance
                .record_rejection(
                    verified.session_id(),
                    &verified.identity().enrollment_number,
                    &err,
                )
                .await;
            attempt.submission = SubmissionStatus::Failed(err.clone());
            return Err(err);
        }

        info!(
            session_id = %verified.session_id(),
            enrollment_number = %verified.identity().enrollment_number,
            "Student verified"
        );

        attempt.authentication = Some(verified.clone());
        Ok(verified)
    }

    /// Re-read the attempt's session. A session that was closed, reset or
    /// timed out since the attempt began is `SessionClosed`.
    async fn current_session(
        &self,
        attempt: &CheckInAttempt,
        enrollment_number: &str,
    ) -> Result<Session> {
        let session_id = &attempt.session.session_id;
        match self.registry.lookup(session_id).await {
            Ok(session) => Ok(session),
            Err(AttendanceError::NotFound(_) | AttendanceError::Expired(_)) => {
                let err = AttendanceError::SessionClosed(session_id.clone());
                self.attendance
                    .record_rejection(session_id, enrollment_number, &err)
                    .await;
                Err(err)
            }
            Err(e) => Err(e),
        }
    }

    /// Record the attempt. Requires a verified identity and an accepted
    /// capture. Calls the attendance service at most once per successful
    /// submission; a second submit after success is `AlreadySubmitted`.
    pub async fn submit(&self, attempt: &mut CheckInAttempt) -> Result<AttendanceRecord> {
        if attempt.is_submitted() {
            return Err(AttendanceError::AlreadySubmitted);
        }
        if let Some(err) = attempt.terminal_error() {
            return Err(err.clone());
        }

        let Some(verified) = attempt.authentication.clone() else {
            return Err(AttendanceError::incomplete("identity has not been verified"));
        };
        let artifact = match attempt.capture.artifact() {
            Some(artifact) if attempt.capture.is_ready() => artifact.clone(),
            _ => {
                return Err(AttendanceError::incomplete(
                    "photo has not been captured and accepted",
                ));
            }
        };

        let session_id = attempt.session.session_id.clone();
        if let Err(e) = self
            .current_session(attempt, &verified.identity().enrollment_number)
            .await
        {
            attempt.submission = SubmissionStatus::Failed(e.clone());
            return Err(e);
        }

        let result = self
            .attendance
            .record(&attempt.session, verified.identity(), rollcall_util::now(), &artifact)
            .await;

        match result {
            Ok(record) => {
                attempt.submission = SubmissionStatus::Submitted(record.clone());
                Ok(record)
            }
            Err(e) => {
                if !e.is_retryable() {
                    self.attendance
                        .record_rejection(&session_id, &verified.identity().enrollment_number, &e)
                        .await;
                }
                attempt.submission = SubmissionStatus::Failed(e.clone());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptureState, StoreAttendanceService};
    use rollcall_api::{DescriptiveKey, SessionDescriptor};
    use rollcall_config::SessionPolicy;
    use rollcall_device::MockCamera;
    use rollcall_store::{SqliteStore, Store};

    struct Harness {
        coordinator: CheckInCoordinator,
        registry: Arc<SessionRegistry>,
        attendance: Arc<StoreAttendanceService>,
        camera: Arc<MockCamera>,
    }

    fn harness() -> Harness {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let registry = Arc::new(SessionRegistry::new(store.clone(), SessionPolicy::default()));
        let attendance = Arc::new(StoreAttendanceService::new(store));
        let camera = Arc::new(MockCamera::new());

        let coordinator = CheckInCoordinator::new(
            registry.clone(),
            EligibilityChecker::default(),
            attendance.clone(),
            camera.clone(),
            CapturePolicy::default(),
        );

        Harness {
            coordinator,
            registry,
            attendance,
            camera,
        }
    }

    fn key() -> DescriptiveKey {
        DescriptiveKey {
            class_name: "CE-A".into(),
            subject: "OS".into(),
            faculty: "Dr. Rao".into(),
            time_slot: "9:00-10:00".into(),
            semester: "5".into(),
            date: "2024-03-01".into(),
        }
    }

    fn asha() -> IdentityFields {
        IdentityFields::new("Asha", "21CE001", "asha@charusat.edu.in")
    }

    async fn ready_attempt(h: &Harness, session: &Session) -> CheckInAttempt {
        let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();
        h.coordinator
            .start_authentication(&mut attempt, &asha())
            .await
            .unwrap();
        attempt.capture_mut().start().await.unwrap();
        attempt.capture_mut().capture().await.unwrap();
        attempt.capture_mut().accept().unwrap();
        attempt
    }

    #[tokio::test]
    async fn full_check_in() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();

        let mut attempt = ready_attempt(&h, &session).await;
        let record = h.coordinator.submit(&mut attempt).await.unwrap();

        assert_eq!(record.session_id, session.session_id);
        assert_eq!(record.enrollment_number, "21CE001");
        assert!(attempt.is_submitted());
        assert_eq!(h.camera.outstanding(), 0);
    }

    #[tokio::test]
    async fn second_submit_is_already_submitted() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();

        let mut attempt = ready_attempt(&h, &session).await;
        h.coordinator.submit(&mut attempt).await.unwrap();

        let err = h.coordinator.submit(&mut attempt).await.unwrap_err();
        assert_eq!(err, AttendanceError::AlreadySubmitted);
        assert_eq!(h.attendance.query(&key()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn authentication_is_cached() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();
        let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();

        let first = h
            .coordinator
            .start_authentication(&mut attempt, &asha())
            .await
            .unwrap();

        // Different fields, even invalid ones, do not re-run the check
        let bogus = IdentityFields::new("", "", "x@gmail.com");
        let second = h
            .coordinator
            .start_authentication(&mut attempt, &bogus)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn submit_without_verification_is_incomplete() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();
        let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();

        attempt.capture_mut().start().await.unwrap();
        attempt.capture_mut().capture().await.unwrap();
        attempt.capture_mut().accept().unwrap();

        let err = h.coordinator.submit(&mut attempt).await.unwrap_err();
        assert!(matches!(err, AttendanceError::IncompleteAttempt(_)));
        assert_eq!(attempt.submission(), &SubmissionStatus::NotSubmitted);
        assert!(h.attendance.query(&key()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_before_accept_is_incomplete() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();
        let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();
        h.coordinator
            .start_authentication(&mut attempt, &asha())
            .await
            .unwrap();

        attempt.capture_mut().start().await.unwrap();
        attempt.capture_mut().capture().await.unwrap();
        assert_eq!(attempt.capture().state(), CaptureState::Captured);

        let err = h.coordinator.submit(&mut attempt).await.unwrap_err();
        assert!(matches!(err, AttendanceError::IncompleteAttempt(_)));
    }

    #[tokio::test]
    async fn duplicate_is_caught_at_authentication() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();

        let mut first = ready_attempt(&h, &session).await;
        h.coordinator.submit(&mut first).await.unwrap();

        let mut second = h.coordinator.begin(session.session_id.as_str()).await.unwrap();
        let err = h
            .coordinator
            .start_authentication(&mut second, &asha())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::DuplicateCheckIn { .. }));
        assert!(err.is_terminal_for_attempt());

        // The attempt is spent; retrying does not help
        let again = h
            .coordinator
            .start_authentication(&mut second, &asha())
            .await
            .unwrap_err();
        assert_eq!(again, err);
    }

    #[tokio::test]
    async fn duplicate_at_submit_is_terminal() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();

        // Both attempts pass authentication before either submits
        let mut first = ready_attempt(&h, &session).await;
        let mut second = ready_attempt(&h, &session).await;

        h.coordinator.submit(&mut first).await.unwrap();

        let err = h.coordinator.submit(&mut second).await.unwrap_err();
        assert!(matches!(err, AttendanceError::DuplicateCheckIn { .. }));
        assert!(matches!(second.submission(), SubmissionStatus::Failed(_)));
        assert!(!second.is_submitted());

        let again = h.coordinator.submit(&mut second).await.unwrap_err();
        assert_eq!(again, err);

        let records = h.attendance.query(&key()).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn session_closed_before_submit() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();
        let mut attempt = ready_attempt(&h, &session).await;

        h.registry.close(&session.session_id).await.unwrap();

        let err = h.coordinator.submit(&mut attempt).await.unwrap_err();
        assert_eq!(err, AttendanceError::SessionClosed(session.session_id.clone()));
        assert!(matches!(attempt.submission(), SubmissionStatus::Failed(_)));
        assert!(h.attendance.query(&key()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_closed_before_authentication() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();
        let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();

        h.registry.close(&session.session_id).await.unwrap();

        let err = h
            .coordinator
            .start_authentication(&mut attempt, &asha())
            .await
            .unwrap_err();
        assert_eq!(err, AttendanceError::SessionClosed(session.session_id.clone()));
        assert!(!attempt.is_verified());
    }

    #[tokio::test]
    async fn session_reset_before_authentication() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();
        let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();

        h.attendance.reset(&key()).await.unwrap();

        let err = h
            .coordinator
            .start_authentication(&mut attempt, &asha())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionClosed(_)));
        assert!(!attempt.is_verified());
    }

    #[tokio::test]
    async fn begin_on_closed_session_is_expired() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();
        h.registry.close(&session.session_id).await.unwrap();

        let err = h.coordinator.begin(session.session_id.as_str()).await.err().unwrap();
        assert!(matches!(err, AttendanceError::Expired(_)));
    }

    #[tokio::test]
    async fn abandon_releases_camera() {
        let h = harness();
        let session = h.registry.create(SessionDescriptor::new(key())).await.unwrap();
        let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();

        attempt.capture_mut().start().await.unwrap();
        assert_eq!(h.camera.outstanding(), 1);

        attempt.abandon();
        assert_eq!(h.camera.outstanding(), 0);
    }
}
