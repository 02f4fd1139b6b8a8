//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rollcall_api::{
    AttendanceRecord, CaptureFormat, DescriptiveKey, Session, SessionDescriptor, SessionStatus,
};
use rollcall_util::{CheckInField, RecordId, SessionId};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::{AuditEvent, NewCheckIn, RosterReset, Selfie, Store, StoreError, StoreResult};

const KEY_MATCH: &str = "class_name = ?1 AND subject = ?2 AND faculty = ?3 \
                         AND time_slot = ?4 AND semester = ?5 AND date = ?6";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                class_name TEXT NOT NULL,
                subject TEXT NOT NULL,
                faculty TEXT NOT NULL,
                time_slot TEXT NOT NULL,
                semester TEXT NOT NULL,
                date TEXT NOT NULL,
                lecture_or_lab TEXT,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL
            );

            -- Check-ins; rowid order is check-in order
            CREATE TABLE IF NOT EXISTS check_ins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id TEXT NOT NULL UNIQUE,
                session_id TEXT NOT NULL,
                class_name TEXT NOT NULL,
                subject TEXT NOT NULL,
                faculty TEXT NOT NULL,
                time_slot TEXT NOT NULL,
                semester TEXT NOT NULL,
                date TEXT NOT NULL,
                student_name TEXT NOT NULL,
                enrollment_number TEXT NOT NULL,
                email TEXT NOT NULL COLLATE NOCASE,
                timestamp TEXT NOT NULL,
                selfie_type TEXT NOT NULL,
                selfie BLOB NOT NULL,
                UNIQUE (session_id, enrollment_number),
                UNIQUE (session_id, email)
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_sessions_key
                ON sessions(class_name, subject, faculty, time_slot, semester, date);
            CREATE INDEX IF NOT EXISTS idx_check_ins_key
                ON check_ins(class_name, subject, faculty, time_slot, semester, date);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn find_conflict(
    conn: &Connection,
    session_id: &SessionId,
    enrollment_number: &str,
    email: &str,
) -> StoreResult<Option<CheckInField>> {
    // email compares with the column's NOCASE collation
    let same_enrollment: Option<bool> = conn
        .query_row(
            r#"
            SELECT enrollment_number = ?2 AS same_enrollment FROM check_ins
            WHERE session_id = ?1 AND (enrollment_number = ?2 OR email = ?3)
            ORDER BY same_enrollment DESC
            LIMIT 1
            "#,
            params![session_id.as_str(), enrollment_number, email],
            |row| row.get(0),
        )
        .optional()?;

    Ok(same_enrollment.map(|same| {
        if same {
            CheckInField::EnrollmentNumber
        } else {
            CheckInField::Email
        }
    }))
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{}': {}", s, e)))
}

struct SessionRow {
    session_id: String,
    key: DescriptiveKey,
    lecture_or_lab: Option<String>,
    created_at: String,
    status: String,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            key: DescriptiveKey {
                class_name: row.get(1)?,
                subject: row.get(2)?,
                faculty: row.get(3)?,
                time_slot: row.get(4)?,
                semester: row.get(5)?,
                date: row.get(6)?,
            },
            lecture_or_lab: row.get(7)?,
            created_at: row.get(8)?,
            status: row.get(9)?,
        })
    }

    fn into_session(self) -> StoreResult<Session> {
        let status = SessionStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Serialization(format!("unknown session status '{}'", self.status))
        })?;

        Ok(Session {
            session_id: SessionId::new(self.session_id),
            descriptor: SessionDescriptor {
                key: self.key,
                lecture_or_lab: self.lecture_or_lab,
            },
            created_at: parse_timestamp(&self.created_at)?,
            status,
        })
    }
}

struct RecordRow {
    record_id: String,
    session_id: String,
    student_name: String,
    enrollment_number: String,
    email: String,
    timestamp: String,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            record_id: row.get(0)?,
            session_id: row.get(1)?,
            student_name: row.get(2)?,
            enrollment_number: row.get(3)?,
            email: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn into_record(self) -> StoreResult<AttendanceRecord> {
        let record_id = RecordId::parse(&self.record_id).ok_or_else(|| {
            StoreError::Serialization(format!("bad record id '{}'", self.record_id))
        })?;

        Ok(AttendanceRecord {
            record_id,
            session_id: SessionId::new(self.session_id),
            student_name: self.student_name,
            enrollment_number: self.enrollment_number,
            email: self.email,
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = parse_timestamp(&timestamp_str)?;
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let key = session.key();

        conn.execute(
            r#"
            INSERT INTO sessions (session_id, class_name, subject, faculty, time_slot,
                                  semester, date, lecture_or_lab, created_at, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                session.session_id.as_str(),
                key.class_name,
                key.subject,
                key.faculty,
                key.time_slot,
                key.semester,
                key.date,
                session.descriptor.lecture_or_lab,
                session.created_at.to_rfc3339(),
                session.status.as_str(),
            ],
        )?;

        debug!(session_id = %session.session_id, "Session stored");
        Ok(())
    }

    fn get_session(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                r#"
                SELECT session_id, class_name, subject, faculty, time_slot, semester, date,
                       lecture_or_lab, created_at, status
                FROM sessions WHERE session_id = ?
                "#,
                [session_id.as_str()],
                SessionRow::from_row,
            )
            .optional()?;

        row.map(SessionRow::into_session).transpose()
    }

    fn set_session_status(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();

        let changed = conn.execute(
            "UPDATE sessions SET status = ? WHERE session_id = ?",
            params![status.as_str(), session_id.as_str()],
        )?;

        debug!(
            session_id = %session_id,
            status = status.as_str(),
            found = changed > 0,
            "Session status updated"
        );
        Ok(changed > 0)
    }

    fn insert_check_in(&self, check_in: &NewCheckIn) -> StoreResult<AttendanceRecord> {
        let conn = self.conn.lock().unwrap();
        let record_id = RecordId::new();
        let key = &check_in.key;
        let identity = &check_in.identity;

        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM sessions WHERE session_id = ?",
                params![check_in.session_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if status.as_deref() == Some(SessionStatus::Closed.as_str()) {
            return Err(StoreError::SessionClosed(check_in.session_id.clone()));
        }

        if let Some(field) = find_conflict(
            &conn,
            &check_in.session_id,
            &identity.enrollment_number,
            &identity.email,
        )? {
            return Err(StoreError::DuplicateCheckIn(field));
        }

        conn.execute(
            r#"
            INSERT INTO check_ins (record_id, session_id, class_name, subject, faculty,
                                   time_slot, semester, date, student_name,
                                   enrollment_number, email, timestamp, selfie_type, selfie)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                record_id.to_string(),
                check_in.session_id.as_str(),
                key.class_name,
                key.subject,
                key.faculty,
                key.time_slot,
                key.semester,
                key.date,
                identity.name,
                identity.enrollment_number,
                identity.email,
                check_in.timestamp.to_rfc3339(),
                check_in.selfie.format.mime_type(),
                check_in.selfie.bytes,
            ],
        )?;

        debug!(
            session_id = %check_in.session_id,
            record_id = %record_id,
            selfie_bytes = check_in.selfie.bytes.len(),
            "Check-in stored"
        );

        Ok(AttendanceRecord {
            record_id,
            session_id: check_in.session_id.clone(),
            student_name: identity.name.clone(),
            enrollment_number: identity.enrollment_number.clone(),
            email: identity.email.clone(),
            timestamp: check_in.timestamp,
        })
    }

    fn find_check_in_conflict(
        &self,
        session_id: &SessionId,
        enrollment_number: &str,
        email: &str,
    ) -> StoreResult<Option<CheckInField>> {
        let conn = self.conn.lock().unwrap();
        find_conflict(&conn, session_id, enrollment_number, email)
    }

    fn list_check_ins(&self, key: &DescriptiveKey) -> StoreResult<Vec<AttendanceRecord>> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            r#"
            SELECT record_id, session_id, student_name, enrollment_number, email, timestamp
            FROM check_ins WHERE {} ORDER BY id ASC
            "#,
            KEY_MATCH
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                key.class_name,
                key.subject,
                key.faculty,
                key.time_slot,
                key.semester,
                key.date,
            ],
            RecordRow::from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }

        Ok(records)
    }

    fn reset_roster(&self, key: &DescriptiveKey) -> StoreResult<RosterReset> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Close first so nothing new lands on the roster being cleared
        let sessions_closed = tx.execute(
            &format!("UPDATE sessions SET status = ?7 WHERE {} AND status != ?7", KEY_MATCH),
            params![
                key.class_name,
                key.subject,
                key.faculty,
                key.time_slot,
                key.semester,
                key.date,
                SessionStatus::Closed.as_str(),
            ],
        )?;
        let deleted_count = tx.execute(
            &format!("DELETE FROM check_ins WHERE {}", KEY_MATCH),
            params![
                key.class_name,
                key.subject,
                key.faculty,
                key.time_slot,
                key.semester,
                key.date,
            ],
        )?;

        tx.commit()?;

        debug!(deleted_count, sessions_closed, "Roster reset");
        Ok(RosterReset {
            deleted_count,
            sessions_closed,
        })
    }

    fn get_selfie(&self, record_id: &RecordId) -> StoreResult<Option<Selfie>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(String, Vec<u8>)> = conn
            .query_row(
                "SELECT selfie_type, selfie FROM check_ins WHERE record_id = ?",
                [record_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((mime, bytes)) => {
                let format = CaptureFormat::from_mime_type(&mime).ok_or_else(|| {
                    StoreError::Serialization(format!("unknown selfie type '{}'", mime))
                })?;
                Ok(Some(Selfie { format, bytes }))
            }
            None => Ok(None),
        }
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
