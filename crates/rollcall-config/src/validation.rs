//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;

/// Longest accepted session lifetime: one year
pub const MAX_SESSION_AGE_MINUTES: u64 = 366 * 24 * 60;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid institutional domain '{value}': {message}")]
    InvalidDomain { value: String, message: String },

    #[error("Capture quality {0} out of range (1-100)")]
    QualityOutOfRange(u8),

    #[error("Session max_age_minutes must be greater than zero")]
    ZeroSessionAge,

    #[error("Session max_age_minutes {0} exceeds the limit of {MAX_SESSION_AGE_MINUTES}")]
    SessionAgeTooLong(u64),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(domain) = &config.eligibility.institutional_domain {
        if let Err(message) = normalize_domain(domain) {
            errors.push(ValidationError::InvalidDomain {
                value: domain.clone(),
                message,
            });
        }
    }

    if let Some(quality) = config.capture.quality {
        if !(1..=100).contains(&quality) {
            errors.push(ValidationError::QualityOutOfRange(quality));
        }
    }

    match config.sessions.max_age_minutes {
        Some(0) => errors.push(ValidationError::ZeroSessionAge),
        Some(minutes) if minutes > MAX_SESSION_AGE_MINUTES => {
            errors.push(ValidationError::SessionAgeTooLong(minutes));
        }
        _ => {}
    }

    errors
}

/// Normalize a configured domain: trim and drop one leading '@'
pub fn normalize_domain(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    let domain = trimmed.strip_prefix('@').unwrap_or(trimmed);

    if domain.is_empty() {
        return Err("Domain cannot be empty".into());
    }
    if domain.contains('@') {
        return Err("Domain must not contain '@'".into());
    }
    if domain.chars().any(char::is_whitespace) {
        return Err("Domain must not contain whitespace".into());
    }

    Ok(domain.to_string())
}
