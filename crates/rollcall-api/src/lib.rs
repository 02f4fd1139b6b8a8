//! Shared value types for rollcall
//!
//! This crate defines the plain data passed between the components:
//! - Sessions, descriptive keys, identity fields, attendance records
//! - Response shapes for session creation, resolution, check-in,
//!   roster queries and resets
//! - Wire error codes derived from the attendance error taxonomy

mod responses;
mod types;

pub use responses::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
