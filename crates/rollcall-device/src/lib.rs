//! Camera device interfaces for rollcall
//!
//! This crate defines the boundary between the check-in core and whatever
//! produces still frames: a real camera, a file on disk, or a test double.
//! Streams are scoped resources: every `open_stream` is paired with exactly
//! one `release`.

mod capabilities;
mod handle;
mod mock;
mod still;
mod traits;

pub use capabilities::*;
pub use handle::*;
pub use mock::*;
pub use still::*;
pub use traits::*;
