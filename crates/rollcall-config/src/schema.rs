//! Raw configuration schema (as parsed from TOML)

use rollcall_api::{CameraFacing, CaptureFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Who may check in
    #[serde(default)]
    pub eligibility: RawEligibility,

    /// How the selfie is encoded
    #[serde(default)]
    pub capture: RawCapture,

    /// Session lifetime
    #[serde(default)]
    pub sessions: RawSessions,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,
}

/// Eligibility rules
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEligibility {
    /// Required email domain, e.g. "charusat.edu.in" (a leading '@' is allowed)
    pub institutional_domain: Option<String>,

    /// Compare the domain case-sensitively (default: false)
    #[serde(default)]
    pub domain_case_sensitive: bool,
}

/// Capture encoding
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCapture {
    /// "jpeg" or "png"
    pub format: Option<CaptureFormat>,

    /// Lossy quality 1-100 (JPEG only)
    pub quality: Option<u8>,

    /// "user" or "environment"
    pub facing: Option<CameraFacing>,
}

/// Session lifetime
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessions {
    /// Open sessions older than this resolve as expired
    pub max_age_minutes: Option<u64>,
}
