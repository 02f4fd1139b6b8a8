//! Time utilities for rollcall
//!
//! Sessions, check-ins and exports are stamped with local wall-clock time.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `ROLLCALL_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising session expiry without waiting.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2024-03-01 09:05:00`)
//!
//! Example:
//! ```bash
//! ROLLCALL_MOCK_TIME="2024-03-01 09:05:00" rollcall show <session>
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "ROLLCALL_MOCK_TIME";

/// Format used for timestamps in exports and human output
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shift applied to the system clock, fixed on first use so that mock
/// time keeps ticking from the configured instant.
static CLOCK_SHIFT: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn clock_shift() -> Option<chrono::Duration> {
    *CLOCK_SHIFT.get_or_init(|| {
        if !cfg!(debug_assertions) {
            return None;
        }
        let value = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
        let mocked = parse_mock_time(&value)?;
        let shift = mocked.signed_duration_since(Local::now());
        tracing::info!(mock_time = %value, shift_secs = shift.num_seconds(), "Using mock time");
        Some(shift)
    })
}

fn parse_mock_time(value: &str) -> Option<DateTime<Local>> {
    let parsed = NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).single());
    if parsed.is_none() {
        tracing::warn!(
            mock_time = %value,
            expected_format = TIMESTAMP_FORMAT,
            "Ignoring unusable mock time"
        );
    }
    parsed
}

/// Whether `ROLLCALL_MOCK_TIME` is in effect
pub fn is_mock_time_active() -> bool {
    clock_shift().is_some()
}

/// Current local time, shifted by mock time in debug builds.
pub fn now() -> DateTime<Local> {
    match clock_shift() {
        Some(shift) => Local::now() + shift,
        None => Local::now(),
    }
}

/// Format a timestamp the way rosters and exports show it.
pub fn format_timestamp(dt: &DateTime<Local>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Time elapsed from `earlier` to `later`, clamped at zero.
pub fn elapsed_between(earlier: &DateTime<Local>, later: &DateTime<Local>) -> Duration {
    later
        .signed_duration_since(*earlier)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        let dt = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(format_timestamp(&dt), "2024-03-01 09:05:07");
    }

    #[test]
    fn test_elapsed_between_clamps() {
        let earlier = Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let later = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

        assert_eq!(elapsed_between(&earlier, &later), Duration::from_secs(1800));
        assert_eq!(elapsed_between(&later, &earlier), Duration::ZERO);
    }

    #[test]
    fn test_parse_mock_time() {
        assert!(parse_mock_time("2024-03-01 09:05:00").is_some());
        assert!(parse_mock_time("2024-03-01T09:05:00").is_none());
        assert!(parse_mock_time("yesterday").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
