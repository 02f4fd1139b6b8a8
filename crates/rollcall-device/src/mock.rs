//! Mock camera for testing

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    CameraCapabilities, CameraDevice, DeviceError, DeviceResult, Frame, StreamHandle,
    StreamRequest,
};

/// Mock camera for unit/integration testing
///
/// Produces a synthetic gradient frame and keeps count of every stream it
/// hands out and gets back, so tests can assert that no handle leaks and
/// that no two streams were ever open at once.
pub struct MockCamera {
    capabilities: CameraCapabilities,
    next_id: AtomicU64,
    open: Mutex<HashSet<u64>>,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
    peak_open: AtomicUsize,
    frames_grabbed: AtomicUsize,

    /// Configure open_stream to fail as if permission was denied
    pub deny_permission: Arc<Mutex<bool>>,

    /// Configure open_stream to fail as if no camera is attached
    pub no_device: Arc<Mutex<bool>>,

    /// Configure grab_frame to fail
    pub fail_grab: Arc<Mutex<bool>>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            capabilities: CameraCapabilities::front_only(64, 48),
            next_id: AtomicU64::new(1),
            open: Mutex::new(HashSet::new()),
            acquisitions: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            peak_open: AtomicUsize::new(0),
            frames_grabbed: AtomicUsize::new(0),
            deny_permission: Arc::new(Mutex::new(false)),
            no_device: Arc::new(Mutex::new(false)),
            fail_grab: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_capabilities(mut self, caps: CameraCapabilities) -> Self {
        self.capabilities = caps;
        self
    }

    /// Streams handed out so far
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Streams given back so far
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Streams currently open
    pub fn outstanding(&self) -> usize {
        self.open.lock().unwrap().len()
    }

    /// Largest number of streams ever open at the same time
    pub fn peak_open(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }

    pub fn frames_grabbed(&self) -> usize {
        self.frames_grabbed.load(Ordering::SeqCst)
    }

    pub fn set_deny_permission(&self, deny: bool) {
        *self.deny_permission.lock().unwrap() = deny;
    }

    pub fn set_no_device(&self, missing: bool) {
        *self.no_device.lock().unwrap() = missing;
    }

    pub fn set_fail_grab(&self, fail: bool) {
        *self.fail_grab.lock().unwrap() = fail;
    }

    fn synthetic_frame(&self, seed: usize) -> RgbImage {
        let (width, height) = self.capabilities.native_resolution;
        let shift = (seed * 37 % 256) as u32;
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 255 / width.max(1) + shift) % 256) as u8,
                ((y * 255 / height.max(1)) % 256) as u8,
                (shift % 256) as u8,
            ])
        })
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    fn capabilities(&self) -> &CameraCapabilities {
        &self.capabilities
    }

    async fn open_stream(&self, request: StreamRequest) -> DeviceResult<StreamHandle> {
        if *self.deny_permission.lock().unwrap() {
            return Err(DeviceError::PermissionDenied("Mock permission denial".into()));
        }
        if *self.no_device.lock().unwrap() {
            return Err(DeviceError::NoDevice("Mock camera unplugged".into()));
        }
        if !self.capabilities.supports_facing(request.facing) {
            return Err(DeviceError::NoDevice(format!("no {:?} camera", request.facing)));
        }

        let mut open = self.open.lock().unwrap();
        if !open.is_empty() {
            return Err(DeviceError::Busy);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        open.insert(id);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.peak_open.fetch_max(open.len(), Ordering::SeqCst);

        let (width, height) = self.capabilities.native_resolution;
        Ok(StreamHandle::new(id, request.facing, width, height))
    }

    async fn grab_frame(&self, stream: &StreamHandle) -> DeviceResult<Frame> {
        if !self.open.lock().unwrap().contains(&stream.id()) {
            return Err(DeviceError::StreamClosed);
        }
        if *self.fail_grab.lock().unwrap() {
            return Err(DeviceError::Frame("Mock frame failure".into()));
        }

        let seed = self.frames_grabbed.fetch_add(1, Ordering::SeqCst);
        Ok(Frame::new(self.synthetic_frame(seed)))
    }

    fn release(&self, stream: StreamHandle) {
        if self.open.lock().unwrap().remove(&stream.id()) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_api::CameraFacing;

    #[tokio::test]
    async fn mock_open_grab_release() {
        let camera = MockCamera::new();

        let stream = camera.open_stream(StreamRequest::default()).await.unwrap();
        assert_eq!(camera.outstanding(), 1);

        let frame = camera.grab_frame(&stream).await.unwrap();
        assert_eq!(frame.dimensions(), (64, 48));

        camera.release(stream);
        assert_eq!(camera.outstanding(), 0);
        assert_eq!(camera.acquisitions(), 1);
        assert_eq!(camera.releases(), 1);
    }

    #[tokio::test]
    async fn mock_refuses_second_stream() {
        let camera = MockCamera::new();

        let first = camera.open_stream(StreamRequest::default()).await.unwrap();
        let second = camera.open_stream(StreamRequest::new(CameraFacing::User)).await;
        assert!(matches!(second, Err(DeviceError::Busy)));
        assert_eq!(camera.peak_open(), 1);

        camera.release(first);
        let third = camera.open_stream(StreamRequest::default()).await.unwrap();
        camera.release(third);
        assert_eq!(camera.releases(), 2);
    }

    #[tokio::test]
    async fn mock_open_failures() {
        let camera = MockCamera::new();

        camera.set_deny_permission(true);
        let result = camera.open_stream(StreamRequest::default()).await;
        assert!(matches!(result, Err(DeviceError::PermissionDenied(_))));

        camera.set_deny_permission(false);
        camera.set_no_device(true);
        let result = camera.open_stream(StreamRequest::default()).await;
        assert!(matches!(result, Err(DeviceError::NoDevice(_))));

        assert_eq!(camera.acquisitions(), 0);
    }

    #[tokio::test]
    async fn mock_honours_facing() {
        let front = MockCamera::new();
        let rear = front.open_stream(StreamRequest::new(CameraFacing::Environment)).await;
        assert!(matches!(rear, Err(DeviceError::NoDevice(_))));

        let both =
            MockCamera::new().with_capabilities(CameraCapabilities::front_and_rear(320, 240));
        let stream = both
            .open_stream(StreamRequest::new(CameraFacing::Environment))
            .await
            .unwrap();
        assert_eq!(stream.resolution(), (320, 240));
        both.release(stream);
    }

    #[tokio::test]
    async fn mock_grab_failure_keeps_stream_open() {
        let camera = MockCamera::new();
        camera.set_fail_grab(true);

        let stream = camera.open_stream(StreamRequest::default()).await.unwrap();
        assert!(camera.grab_frame(&stream).await.is_err());
        assert_eq!(camera.outstanding(), 1);

        camera.release(stream);
        assert_eq!(camera.outstanding(), 0);
    }
}
