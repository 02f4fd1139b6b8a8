//! Shared utilities for rollcall
//!
//! This crate provides:
//! - ID types (SessionId, RecordId)
//! - The attendance error taxonomy
//! - Wall-clock time with a development override
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
