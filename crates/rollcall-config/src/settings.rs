//! Validated settings structures

use crate::schema::{RawCapture, RawConfig, RawEligibility, RawServiceConfig, RawSessions};
use crate::validation::normalize_domain;
use rollcall_api::{CameraFacing, CaptureFormat};
use std::path::PathBuf;
use std::time::Duration;

/// Institutional domain used when the config does not name one
pub const DEFAULT_INSTITUTIONAL_DOMAIN: &str = "charusat.edu.in";

/// Lossy quality used when the config does not name one
pub const DEFAULT_CAPTURE_QUALITY: u8 = 80;

/// Validated settings ready for use by the core
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub eligibility: EligibilityPolicy,
    pub capture: CapturePolicy,
    pub sessions: SessionPolicy,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            eligibility: EligibilityPolicy::from_raw(raw.eligibility),
            capture: CapturePolicy::from_raw(raw.capture),
            sessions: SessionPolicy::from_raw(raw.sessions),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(rollcall_util::default_data_dir),
        }
    }

    /// Location of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(rollcall_util::DATABASE_FILENAME)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: rollcall_util::default_data_dir(),
        }
    }
}

/// Who may check in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPolicy {
    /// Domain without the leading '@'
    pub institutional_domain: String,
    pub domain_case_sensitive: bool,
}

impl EligibilityPolicy {
    pub fn new(institutional_domain: impl Into<String>) -> Self {
        Self {
            institutional_domain: institutional_domain.into(),
            domain_case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.domain_case_sensitive = yes;
        self
    }

    fn from_raw(raw: RawEligibility) -> Self {
        let institutional_domain = raw
            .institutional_domain
            .and_then(|d| normalize_domain(&d).ok())
            .unwrap_or_else(|| DEFAULT_INSTITUTIONAL_DOMAIN.to_string());

        Self {
            institutional_domain,
            domain_case_sensitive: raw.domain_case_sensitive,
        }
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INSTITUTIONAL_DOMAIN)
    }
}

/// How a still frame is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    pub format: CaptureFormat,
    /// 1-100, JPEG only
    pub quality: u8,
    pub facing: CameraFacing,
}

impl CapturePolicy {
    fn from_raw(raw: RawCapture) -> Self {
        Self {
            format: raw.format.unwrap_or_default(),
            quality: raw.quality.unwrap_or(DEFAULT_CAPTURE_QUALITY),
            facing: raw.facing.unwrap_or_default(),
        }
    }
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            format: CaptureFormat::Jpeg,
            quality: DEFAULT_CAPTURE_QUALITY,
            facing: CameraFacing::User,
        }
    }
}

/// Session lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Open sessions older than this resolve as expired. None means no limit.
    pub max_age: Option<Duration>,
}

impl SessionPolicy {
    fn from_raw(raw: RawSessions) -> Self {
        Self {
            max_age: raw
                .max_age_minutes
                .and_then(|minutes| minutes.checked_mul(60))
                .map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_institution() {
        let settings = Settings::default();
        assert_eq!(settings.eligibility.institutional_domain, "charusat.edu.in");
        assert!(!settings.eligibility.domain_case_sensitive);
        assert_eq!(settings.capture.quality, 80);
        assert_eq!(settings.capture.facing, CameraFacing::User);
    }

    #[test]
    fn oversized_lifetime_does_not_overflow() {
        let policy = SessionPolicy::from_raw(RawSessions {
            max_age_minutes: Some(u64::MAX),
        });
        assert!(policy.max_age.is_none());
    }

    #[test]
    fn database_lives_in_data_dir() {
        let service = ServiceConfig {
            data_dir: PathBuf::from("/srv/rollcall"),
        };
        assert_eq!(service.database_path(), PathBuf::from("/srv/rollcall/rollcall.db"));
    }
}
