//! Strongly-typed identifiers for rollcall

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::AttendanceError;

/// Query parameter carrying the session identifier in QR payloads and links
pub const SESSION_QUERY_PARAM: &str = "session_id";

/// Opaque identifier of an attendance session
///
/// Freshly created sessions get a random UUID, but lookups accept any
/// string so an unknown identifier resolves to "not found" rather than
/// a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Allocate a fresh, globally unique identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a shared token into a session identifier.
    ///
    /// Accepts the plain identifier typed by hand, the QR payload
    /// (`session_id=<id>`), or a link carrying `?session_id=<id>`.
    /// Surrounding whitespace is ignored.
    pub fn from_shared(token: &str) -> Result<Self, AttendanceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AttendanceError::validation("session identifier is empty"));
        }

        let needle = format!("{}=", SESSION_QUERY_PARAM);
        let raw = match token.find(&needle) {
            Some(pos) => {
                let rest = &token[pos + needle.len()..];
                rest.split(['&', '#']).next().unwrap_or_default().trim()
            }
            None => token,
        };

        if raw.is_empty() {
            return Err(AttendanceError::validation(
                "shared link does not carry a session identifier",
            ));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(AttendanceError::validation(
                "session identifier must not contain whitespace",
            ));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier of a stored attendance record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
