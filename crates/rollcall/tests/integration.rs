//! Integration tests for rollcall
//!
//! These tests drive the components end to end, the way the command-line
//! front end wires them, against an in-memory store and a mock camera.

use rollcall_api::{
    AttendanceRecord, AttendanceReport, DescriptiveKey, IdentityFields, SessionDescriptor,
    SessionStatus,
};
use rollcall_config::{CapturePolicy, EligibilityPolicy, SessionPolicy, parse_config};
use rollcall_core::{
    AttendanceQueryService, CaptureController, CaptureState, CheckInCoordinator,
    EligibilityChecker, SessionRegistry, ShareArtifact, StoreAttendanceService,
    SubmissionStatus,
};
use rollcall_device::{MockCamera, StillImageCamera};
use rollcall_store::{AuditEventType, SqliteStore, Store};
use rollcall_util::AttendanceError;
use std::sync::Arc;

struct Harness {
    store: Arc<dyn Store>,
    registry: Arc<SessionRegistry>,
    attendance: Arc<StoreAttendanceService>,
    camera: Arc<MockCamera>,
    coordinator: CheckInCoordinator,
}

fn harness_with(eligibility: EligibilityPolicy) -> Harness {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let registry = Arc::new(SessionRegistry::new(store.clone(), SessionPolicy::default()));
    let attendance = Arc::new(StoreAttendanceService::new(store.clone()));
    let camera = Arc::new(MockCamera::new());

    let coordinator = CheckInCoordinator::new(
        registry.clone(),
        EligibilityChecker::new(eligibility),
        attendance.clone(),
        camera.clone(),
        CapturePolicy::default(),
    );

    Harness {
        store,
        registry,
        attendance,
        camera,
        coordinator,
    }
}

fn harness() -> Harness {
    harness_with(EligibilityPolicy::default())
}

fn ce_a_os() -> DescriptiveKey {
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

fn student(n: u32) -> IdentityFields {
    IdentityFields::new(
        format!("Student {n}"),
        format!("21CE{:03}", n + 100),
        format!("student{n}@charusat.edu.in"),
    )
}

async fn check_in(
    h: &Harness,
    token: &str,
    identity: &IdentityFields,
) -> Result<AttendanceRecord, AttendanceError> {
    let mut attempt = h.coordinator.begin(token).await?;
    h.coordinator.start_authentication(&mut attempt, identity).await?;

    let capture = attempt.capture_mut();
    capture.start().await?;
    capture.capture().await?;
    capture.accept()?;

    h.coordinator.submit(&mut attempt).await
}

#[tokio::test]
async fn test_lookup_after_create_returns_open_session_with_same_key() {
    let h = harness();

    let created = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();
    let found = h.registry.lookup(&created.session_id).await.unwrap();

    assert_eq!(found.status, SessionStatus::Open);
    assert_eq!(found.key(), &ce_a_os());
    assert!(found.descriptor.lecture_or_lab.is_none());
}

#[tokio::test]
async fn test_full_check_in_scenario() {
    let h = harness();

    let session = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();
    let share = ShareArtifact::for_session(&session.session_id).unwrap();

    // The student scans the QR code
    let mut attempt = h.coordinator.begin(&share.qr_payload).await.unwrap();
    assert_eq!(attempt.session().key(), &ce_a_os());
    assert!(attempt.session().is_open());

    h.coordinator
        .start_authentication(&mut attempt, &asha())
        .await
        .unwrap();
    assert!(attempt.is_verified());
    let verified = attempt.verified_identity().unwrap();
    assert_eq!(verified.identity(), &asha());

    let capture = attempt.capture_mut();
    capture.start().await.unwrap();
    let artifact = capture.capture().await.unwrap().clone();
    capture.accept().unwrap();
    assert!(!artifact.bytes().is_empty());

    let record = h.coordinator.submit(&mut attempt).await.unwrap();
    assert_eq!(record.enrollment_number, "21CE001");
    assert_eq!(record.student_name, "Asha");
    assert_eq!(record.email, "asha@charusat.edu.in");

    let records = h.attendance.query(&ce_a_os()).await.unwrap();
    let report = AttendanceReport::new(ce_a_os(), records);
    assert_eq!(report.total_attendance, 1);
    assert_eq!(report.records[0].record_id, record.record_id);
    assert_eq!(report.query, ce_a_os());

    // The photo went to the store with the record
    let selfie = h.attendance.selfie(&record.record_id).await.unwrap().unwrap();
    assert_eq!(selfie.bytes, artifact.bytes());
    assert_eq!(h.camera.outstanding(), 0);
}

#[tokio::test]
async fn test_foreign_email_never_reaches_verified() {
    let h = harness();
    let session = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();

    let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();
    let identity = IdentityFields::new("Asha", "21CE001", "asha@gmail.com");

    let err = h
        .coordinator
        .start_authentication(&mut attempt, &identity)
        .await
        .unwrap_err();

    assert!(matches!(err, AttendanceError::DomainMismatch { .. }));
    assert!(!attempt.is_verified());

    // Capture alone cannot carry it over the line
    let capture = attempt.capture_mut();
    capture.start().await.unwrap();
    capture.capture().await.unwrap();
    capture.accept().unwrap();
    let err = h.coordinator.submit(&mut attempt).await.unwrap_err();
    assert!(matches!(err, AttendanceError::IncompleteAttempt(_)));

    let audits = h.store.get_recent_audits(10).unwrap();
    assert!(
        audits
            .iter()
            .any(|e| matches!(e.event, AuditEventType::CheckInRejected { .. }))
    );
}

#[tokio::test]
async fn test_domain_case_policy_both_ways() {
    let emails_in_domain = [
        "asha@charusat.edu.in",
        "asha@CHARUSAT.EDU.IN",
        "Asha.Patel@Charusat.Edu.In",
    ];
    let emails_outside = [
        "asha@gmail.com",
        "asha@charusat.edu",
        "asha@mail.charusat.edu.in",
        "asha.charusat.edu.in",
    ];

    let lenient = harness();
    let session = lenient
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();
    let checker = EligibilityChecker::default();

    for email in emails_in_domain {
        let identity = IdentityFields::new("Asha", "21CE001", email);
        assert!(checker.verify(&session, &identity).is_ok(), "{email}");
    }
    for email in emails_outside {
        let identity = IdentityFields::new("Asha", "21CE001", email);
        let err = checker.verify(&session, &identity).unwrap_err();
        assert!(matches!(err, AttendanceError::DomainMismatch { .. }), "{email}");
    }

    let strict = EligibilityChecker::new(EligibilityPolicy::default().case_sensitive(true));
    assert!(strict.verify(&session, &asha()).is_ok());
    for email in &emails_in_domain[1..] {
        let identity = IdentityFields::new("Asha", "21CE001", *email);
        let err = strict.verify(&session, &identity).unwrap_err();
        assert!(matches!(err, AttendanceError::DomainMismatch { .. }), "{email}");
    }
}

#[tokio::test]
async fn test_capture_never_holds_two_handles() {
    let h = harness();
    let mut ctl = CaptureController::new(h.camera.clone(), CapturePolicy::default());

    let check = |camera: &MockCamera| {
        let held = camera.acquisitions() - camera.releases();
        assert!(held <= 1, "held {held} handles");
        assert_eq!(held, camera.outstanding());
    };

    // A long mixed sequence including failures and out-of-order calls
    for round in 0..5 {
        let _ = ctl.start().await;
        check(&h.camera);
        let _ = ctl.start().await;
        check(&h.camera);

        if round % 2 == 0 {
            let _ = ctl.cancel();
            check(&h.camera);
            let _ = ctl.start().await;
            check(&h.camera);
        }

        let _ = ctl.capture().await;
        check(&h.camera);
        let _ = ctl.retake().await;
        check(&h.camera);
        let _ = ctl.retake().await;
        check(&h.camera);

        h.camera.set_fail_grab(round == 3);
        let _ = ctl.capture().await;
        check(&h.camera);
        h.camera.set_fail_grab(false);

        h.camera.set_deny_permission(round == 1);
        let _ = ctl.retake().await;
        check(&h.camera);
        h.camera.set_deny_permission(false);

        ctl.abandon();
        check(&h.camera);
    }

    assert_eq!(h.camera.peak_open(), 1);
    assert_eq!(h.camera.outstanding(), 0);
    assert!(h.camera.acquisitions() > 5);
}

#[tokio::test]
async fn test_submit_twice_records_once() {
    let h = harness();
    let session = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();

    let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();
    h.coordinator
        .start_authentication(&mut attempt, &asha())
        .await
        .unwrap();
    let capture = attempt.capture_mut();
    capture.start().await.unwrap();
    capture.capture().await.unwrap();
    capture.accept().unwrap();

    let first = h.coordinator.submit(&mut attempt).await.unwrap();
    let second = h.coordinator.submit(&mut attempt).await.unwrap_err();

    assert_eq!(second, AttendanceError::AlreadySubmitted);
    assert_eq!(attempt.submission(), &SubmissionStatus::Submitted(first));
    assert_eq!(h.attendance.query(&ce_a_os()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_enrollment_in_session() {
    let h = harness();
    let session = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();
    let artifact = {
        let mut ctl = CaptureController::new(h.camera.clone(), CapturePolicy::default());
        ctl.start().await.unwrap();
        ctl.capture().await.unwrap().clone()
    };

    h.attendance
        .record(&session, &asha(), rollcall_util::now(), &artifact)
        .await
        .unwrap();

    let mut same_student = asha();
    same_student.email = "asha.p@charusat.edu.in".into();
    let err = h
        .attendance
        .record(&session, &same_student, rollcall_util::now(), &artifact)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::DuplicateCheckIn { .. }));

    let records = h.attendance.query(&ce_a_os()).await.unwrap();
    let asha_records = records
        .iter()
        .filter(|r| r.enrollment_number == "21CE001")
        .count();
    assert_eq!(asha_records, 1);
}

#[tokio::test]
async fn test_duplicate_resubmission_stays_failed() {
    let h = harness();
    let session = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();

    check_in(&h, session.session_id.as_str(), &asha()).await.unwrap();

    let err = check_in(&h, session.session_id.as_str(), &asha())
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::DuplicateCheckIn { .. }));
    assert!(err.is_terminal_for_attempt());
    assert_eq!(h.attendance.query(&ce_a_os()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reset_removes_three_records() {
    let h = harness();
    let session = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();

    for n in 1..=3 {
        check_in(&h, session.session_id.as_str(), &student(n))
            .await
            .unwrap();
    }
    assert_eq!(h.attendance.query(&ce_a_os()).await.unwrap().len(), 3);

    assert_eq!(h.attendance.reset(&ce_a_os()).await.unwrap(), 3);
    assert!(h.attendance.query(&ce_a_os()).await.unwrap().is_empty());

    // Idempotent
    assert_eq!(h.attendance.reset(&ce_a_os()).await.unwrap(), 0);

    // The session was closed with it
    let err = h.registry.lookup(&session.session_id).await.unwrap_err();
    assert!(matches!(err, AttendanceError::Expired(_)));
}

#[tokio::test]
async fn test_query_is_in_check_in_order_and_scoped_to_key() {
    let h = harness();
    let morning = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();

    let mut other_key = ce_a_os();
    other_key.subject = "DBMS".into();
    let other = h
        .registry
        .create(SessionDescriptor::new(other_key.clone()))
        .await
        .unwrap();

    for n in [5, 2, 9] {
        check_in(&h, morning.session_id.as_str(), &student(n))
            .await
            .unwrap();
    }
    check_in(&h, other.session_id.as_str(), &student(1))
        .await
        .unwrap();

    let names: Vec<_> = h
        .attendance
        .query(&ce_a_os())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.student_name)
        .collect();
    assert_eq!(names, ["Student 5", "Student 2", "Student 9"]);
    assert_eq!(h.attendance.query(&other_key).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_export_writes_workbook() {
    let h = harness();
    let session = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();
    check_in(&h, session.session_id.as_str(), &asha()).await.unwrap();

    let artifact = h.attendance.export(&ce_a_os()).await.unwrap();
    assert_eq!(artifact.filename, "attendance_CE-A_OS_2024-03-01.xlsx");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(&artifact.filename);
    std::fs::write(&path, &artifact.bytes).unwrap();
    assert_eq!(&std::fs::read(&path).unwrap()[..2], b"PK");
}

#[tokio::test]
async fn test_device_failure_is_retryable() {
    let h = harness();
    let session = h
        .registry
        .create(SessionDescriptor::new(ce_a_os()))
        .await
        .unwrap();

    let mut attempt = h.coordinator.begin(session.session_id.as_str()).await.unwrap();
    h.coordinator
        .start_authentication(&mut attempt, &asha())
        .await
        .unwrap();

    h.camera.set_deny_permission(true);
    let err = attempt.capture_mut().start().await.unwrap_err();
    assert!(matches!(err, AttendanceError::DeviceUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(attempt.capture().state(), CaptureState::Idle);

    // The student allows the camera and repeats the step
    h.camera.set_deny_permission(false);
    let capture = attempt.capture_mut();
    capture.start().await.unwrap();
    capture.capture().await.unwrap();
    capture.accept().unwrap();

    assert!(h.coordinator.submit(&mut attempt).await.is_ok());
}

#[tokio::test]
async fn test_lifetime_from_config_expires_sessions() {
    let settings = parse_config(
        r#"
        config_version = 1

        [sessions]
        max_age_minutes = 30
        "#,
    )
    .unwrap();

    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let registry = SessionRegistry::new(store.clone(), settings.sessions);

    let stale = rollcall_api::Session {
        session_id: rollcall_util::SessionId::generate(),
        descriptor: SessionDescriptor::new(ce_a_os()),
        created_at: rollcall_util::now() - chrono::Duration::hours(2),
        status: SessionStatus::Open,
    };
    store.insert_session(&stale).unwrap();

    let err = registry.lookup(&stale.session_id).await.unwrap_err();
    assert!(matches!(err, AttendanceError::Expired(_)));
}

#[tokio::test]
async fn test_check_in_with_photo_file() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("asha.png");
    image::RgbImage::from_pixel(120, 90, image::Rgb([90, 120, 150]))
        .save(&photo)
        .unwrap();

    let store: Arc<dyn Store> =
        Arc::new(SqliteStore::open(dir.path().join("rollcall.db")).unwrap());
    let registry = Arc::new(SessionRegistry::new(store.clone(), SessionPolicy::default()));
    let attendance = Arc::new(StoreAttendanceService::new(store.clone()));
    let coordinator = CheckInCoordinator::new(
        registry.clone(),
        EligibilityChecker::default(),
        attendance.clone(),
        Arc::new(StillImageCamera::new(&photo)),
        CapturePolicy::default(),
    );

    let session = registry
        .create(SessionDescriptor::new(ce_a_os()).with_kind("Lecture"))
        .await
        .unwrap();

    let link = format!("/student/attendance?session_id={}", session.session_id);
    let mut attempt = coordinator.begin(&link).await.unwrap();
    coordinator
        .start_authentication(&mut attempt, &asha())
        .await
        .unwrap();
    let capture = attempt.capture_mut();
    capture.start().await.unwrap();
    let (width, height) = capture.capture().await.unwrap().dimensions();
    assert_eq!((width, height), (120, 90));
    capture.accept().unwrap();

    let record = coordinator.submit(&mut attempt).await.unwrap();
    let selfie = attendance.selfie(&record.record_id).await.unwrap().unwrap();
    assert_eq!(&selfie.bytes[..2], &[0xFF, 0xD8]);
}
