//! Session lifecycle and student check-in for rollcall
//!
//! This crate is the heart of rollcall, containing:
//! - Session registry (create, resolve, close, lifetime)
//! - Eligibility checks (identity fields, institutional email, open session)
//! - Camera capture state machine (Idle -> Acquiring -> Live -> Captured -> Ready)
//! - Check-in coordinator with at-most-once submission
//! - Attendance service over the store (record, query, export, reset)
//! - Share artifact for a session (QR code, link, manual code)

mod attendance;
mod capture;
mod coordinator;
mod eligibility;
mod registry;
mod share;

pub use attendance::*;
pub use capture::*;
pub use coordinator::*;
pub use eligibility::*;
pub use registry::*;
pub use share::*;
