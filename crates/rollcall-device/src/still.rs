//! Camera backed by an image file
//!
//! Used by the command-line front end, where a student supplies a photo
//! instead of a live sensor.

use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::{
    CameraCapabilities, CameraDevice, DeviceError, DeviceResult, Frame, StreamHandle,
    StreamRequest,
};

/// Camera that "sees" a single image file
pub struct StillImageCamera {
    path: PathBuf,
    capabilities: CameraCapabilities,
    next_id: AtomicU64,
    /// Decoded image for the currently open stream
    current: Mutex<Option<(u64, RgbImage)>>,
}

impl StillImageCamera {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let mut capabilities = CameraCapabilities::front_and_rear(0, 0);
        capabilities.live_preview = false;

        Self {
            path: path.as_ref().to_path_buf(),
            capabilities,
            next_id: AtomicU64::new(1),
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> DeviceResult<MutexGuard<'_, Option<(u64, RgbImage)>>> {
        self.current.lock().map_err(|_| DeviceError::Poisoned)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CameraDevice for StillImageCamera {
    fn capabilities(&self) -> &CameraCapabilities {
        &self.capabilities
    }

    async fn open_stream(&self, request: StreamRequest) -> DeviceResult<StreamHandle> {
        if self.current()?.is_some() {
            return Err(DeviceError::Busy);
        }
        if !self.path.exists() {
            return Err(DeviceError::NoDevice(format!(
                "{} does not exist",
                self.path.display()
            )));
        }

        let path = self.path.clone();
        let decoded = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| DeviceError::Frame(e.to_string()))?
            .map_err(|e| DeviceError::NoDevice(format!("{}: {}", self.path.display(), e)))?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current()?;
        if current.is_some() {
            return Err(DeviceError::Busy);
        }
        *current = Some((id, rgb));

        debug!(path = %self.path.display(), width, height, "Still image stream opened");
        Ok(StreamHandle::new(id, request.facing, width, height))
    }

    async fn grab_frame(&self, stream: &StreamHandle) -> DeviceResult<Frame> {
        match &*self.current()? {
            Some((id, image)) if *id == stream.id() => Ok(Frame::new(image.clone())),
            _ => Err(DeviceError::StreamClosed),
        }
    }

    fn release(&self, stream: StreamHandle) {
        // Release always clears the slot, poisoned or not
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(&*current, Some((id, _)) if *id == stream.id()) {
            *current = None;
            debug!(stream_id = stream.id(), "Still image stream released");
        }
    }
}
