//! Camera device traits

use async_trait::async_trait;
use thiserror::Error;

use crate::{CameraCapabilities, Frame, StreamHandle, StreamRequest};

/// Errors from camera operations
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("No camera available: {0}")]
    NoDevice(String),

    #[error("Camera is already in use")]
    Busy,

    #[error("Stream is not open")]
    StreamClosed,

    #[error("Failed to grab frame: {0}")]
    Frame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the device state
    #[error("Camera state is poisoned")]
    Poisoned,
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl From<DeviceError> for rollcall_util::AttendanceError {
    fn from(e: DeviceError) -> Self {
        rollcall_util::AttendanceError::DeviceUnavailable(e.to_string())
    }
}

/// Camera device trait - implemented by real and simulated cameras
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Get the capabilities of this device
    fn capabilities(&self) -> &CameraCapabilities;

    /// Ask for permission and open a stream
    async fn open_stream(&self, request: StreamRequest) -> DeviceResult<StreamHandle>;

    /// Grab one still frame at the stream's native resolution
    async fn grab_frame(&self, stream: &StreamHandle) -> DeviceResult<Frame>;

    /// End a stream. Synchronous so it can run from `Drop`.
    fn release(&self, stream: StreamHandle);

    /// Optional: check if the device is healthy
    fn is_healthy(&self) -> bool {
        true
    }
}
