//! Shared types for the rollcall API

use chrono::{DateTime, Local};
use rollcall_util::{RecordId, SessionId};
use serde::{Deserialize, Serialize};

/// Tuple addressing sessions and rosters for query, export and reset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptiveKey {
    pub class_name: String,
    pub subject: String,
    pub faculty: String,
    pub time_slot: String,
    pub semester: String,
    pub date: String,
}

impl DescriptiveKey {
    /// Field names paired with their values, in declaration order
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("class_name", self.class_name.as_str()),
            ("subject", self.subject.as_str()),
            ("faculty", self.faculty.as_str()),
            ("time_slot", self.time_slot.as_str()),
            ("semester", self.semester.as_str()),
            ("date", self.date.as_str()),
        ]
    }

    /// Names of fields that are empty after trimming
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Copy with surrounding whitespace removed from every field
    pub fn trimmed(&self) -> Self {
        Self {
            class_name: self.class_name.trim().to_string(),
            subject: self.subject.trim().to_string(),
            faculty: self.faculty.trim().to_string(),
            time_slot: self.time_slot.trim().to_string(),
            semester: self.semester.trim().to_string(),
            date: self.date.trim().to_string(),
        }
    }

    /// Download filename for this roster: `attendance_<class>_<subject>_<date>.xlsx`
    pub fn export_filename(&self) -> String {
        format!(
            "attendance_{}_{}_{}.xlsx",
            self.class_name, self.subject, self.date
        )
    }
}

/// Everything an instructor supplies when opening a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    #[serde(flatten)]
    pub key: DescriptiveKey,

    /// "Lecture" or "Lab"; informational, not part of the key
    #[serde(default)]
    pub lecture_or_lab: Option<String>,
}

impl SessionDescriptor {
    pub fn new(key: DescriptiveKey) -> Self {
        Self {
            key,
            lecture_or_lab: None,
        }
    }

    pub fn with_kind(mut self, lecture_or_lab: impl Into<String>) -> Self {
        self.lecture_or_lab = Some(lecture_or_lab.into());
        self
    }
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(SessionStatus::Open),
            "closed" => Some(SessionStatus::Closed),
            _ => None,
        }
    }
}

/// An attendance session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub descriptor: SessionDescriptor,
    pub created_at: DateTime<Local>,
    pub status: SessionStatus,
}

impl Session {
    pub fn key(&self) -> &DescriptiveKey {
        &self.descriptor.key
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

/// Identity a student presents when checking in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFields {
    pub name: String,
    pub enrollment_number: String,
    pub email: String,
}

impl IdentityFields {
    pub fn new(
        name: impl Into<String>,
        enrollment_number: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            enrollment_number: enrollment_number.into(),
            email: email.into(),
        }
    }
}

/// Persisted result of an accepted check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub record_id: RecordId,
    pub session_id: SessionId,
    pub student_name: String,
    pub enrollment_number: String,
    pub email: String,
    pub timestamp: DateTime<Local>,
}

/// Encoding of a capture artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureFormat {
    #[default]
    Jpeg,
    Png,
}

impl CaptureFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            CaptureFormat::Jpeg => "image/jpeg",
            CaptureFormat::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CaptureFormat::Jpeg => "jpg",
            CaptureFormat::Png => "png",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" => Some(CaptureFormat::Jpeg),
            "image/png" => Some(CaptureFormat::Png),
            _ => None,
        }
    }
}

/// Which camera to ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    /// Front camera, for selfies
    #[default]
    User,
    Environment,
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn missing_fields_reports_blank_values() {
        let mut k = key();
        assert!(k.missing_fields().is_empty());

        k.subject = "   ".into();
        k.date = String::new();
        assert_eq!(k.missing_fields(), vec!["subject", "date"]);
    }

    #[test]
    fn export_filename_convention() {
        assert_eq!(key().export_filename(), "attendance_CE-A_OS_2024-03-01.xlsx");
    }

    #[test]
    fn descriptor_flattens_key() {
        let descriptor = SessionDescriptor::new(key()).with_kind("Lab");
        let json = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(json["class_name"], "CE-A");
        assert_eq!(json["lecture_or_lab"], "Lab");

        let parsed: SessionDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [SessionStatus::Open, SessionStatus::Closed] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("active"), None);
    }
}
