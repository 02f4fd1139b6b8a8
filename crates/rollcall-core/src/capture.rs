//! Camera capture state machine
//!
//! ```text
//! Idle --start--> Acquiring --ok--> Live --capture--> Captured --accept--> Ready
//!  ^                  |              |                   |
//!  +------ fail ------+              |                   |
//!  +------ cancel -------------------+                   |
//!                     ^                                  |
//!                     +------------- retake -------------+
//! ```
//!
//! The controller is the only owner of the stream handle. A handle is held
//! exactly while the state is `Live`; every other state has none.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use rollcall_api::CaptureFormat;
use rollcall_config::CapturePolicy;
use rollcall_device::{CameraDevice, StreamHandle, StreamRequest};
use rollcall_util::{AttendanceError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No device acquired
    Idle,
    /// Stream request in flight
    Acquiring,
    /// Stream open, preview running
    Live,
    /// One image held, device released
    Captured,
    /// Image finalized for submission
    Ready,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::Acquiring => "acquiring",
            CaptureState::Live => "live",
            CaptureState::Captured => "captured",
            CaptureState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// The single compressed still produced by a capture. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    format: CaptureFormat,
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl CaptureArtifact {
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Encode a frame at its native resolution
pub fn encode_frame(
    image: &RgbImage,
    policy: &CapturePolicy,
) -> image::ImageResult<CaptureArtifact> {
    let (width, height) = image.dimensions();
    let mut bytes = Vec::new();

    match policy.format {
        CaptureFormat::Jpeg => JpegEncoder::new_with_quality(&mut bytes, policy.quality)
            .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)?,
        CaptureFormat::Png => PngEncoder::new(&mut bytes).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        )?,
    }

    Ok(CaptureArtifact {
        format: policy.format,
        bytes,
        width,
        height,
    })
}

/// Drives one camera through a single capture
pub struct CaptureController {
    camera: Arc<dyn CameraDevice>,
    policy: CapturePolicy,
    state: CaptureState,
    stream: Option<StreamHandle>,
    artifact: Option<CaptureArtifact>,
}

impl CaptureController {
    pub fn new(camera: Arc<dyn CameraDevice>, policy: CapturePolicy) -> Self {
        Self {
            camera,
            policy,
            state: CaptureState::Idle,
            stream: None,
            artifact: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == CaptureState::Ready
    }

    /// Whether a device stream is currently held
    pub fn holds_device(&self) -> bool {
        self.stream.is_some()
    }

    /// The pending image, in `Captured` or `Ready`
    pub fn artifact(&self) -> Option<&CaptureArtifact> {
        self.artifact.as_ref()
    }

    /// Request the camera. `Idle -> Acquiring -> Live`, or back to `Idle`
    /// with `DeviceUnavailable` on failure.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            // Acquiring only persists if a previous start was dropped mid-flight
            CaptureState::Idle | CaptureState::Acquiring => self.acquire().await,
            other => Err(invalid_transition("start", other)),
        }
    }

    /// Grab one frame. `Live -> Captured`; the stream is released either way.
    pub async fn capture(&mut self) -> Result<&CaptureArtifact> {
        if self.state != CaptureState::Live {
            return Err(invalid_transition("capture", self.state));
        }
        let Some(stream) = self.stream.as_ref() else {
            self.state = CaptureState::Idle;
            return Err(AttendanceError::device("camera stream was lost"));
        };

        let grabbed = self.camera.grab_frame(stream).await;
        self.release_stream();

        let frame = match grabbed {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Frame grab failed");
                self.state = CaptureState::Idle;
                return Err(e.into());
            }
        };

        let artifact = match encode_frame(&frame.image, &self.policy) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(error = %e, "Frame encoding failed");
                self.state = CaptureState::Idle;
                return Err(AttendanceError::device(format!("could not encode image: {}", e)));
            }
        };

        let (width, height) = artifact.dimensions();
        debug!(
            width,
            height,
            bytes = artifact.bytes().len(),
            format = artifact.format().mime_type(),
            "Frame captured"
        );

        self.state = CaptureState::Captured;
        Ok(&*self.artifact.insert(artifact))
    }

    /// Discard the image and ask for the camera again. `Captured -> Acquiring`.
    pub async fn retake(&mut self) -> Result<()> {
        if self.state != CaptureState::Captured {
            return Err(invalid_transition("retake", self.state));
        }

        self.artifact = None;
        self.acquire().await
    }

    /// Stop the preview. `Live -> Idle`, releasing the device.
    pub fn cancel(&mut self) -> Result<()> {
        if self.state != CaptureState::Live {
            return Err(invalid_transition("cancel", self.state));
        }

        self.release_stream();
        self.state = CaptureState::Idle;
        debug!("Capture cancelled");
        Ok(())
    }

    /// Keep the image for submission. `Captured -> Ready`.
    pub fn accept(&mut self) -> Result<()> {
        if self.state != CaptureState::Captured || self.artifact.is_none() {
            return Err(invalid_transition("accept", self.state));
        }

        self.state = CaptureState::Ready;
        debug!("Capture accepted");
        Ok(())
    }

    /// Leave from any state: release the device, drop the image, go `Idle`.
    pub fn abandon(&mut self) {
        self.release_stream();
        self.artifact = None;
        if self.state != CaptureState::Idle {
            debug!(from = %self.state, "Capture abandoned");
        }
        self.state = CaptureState::Idle;
    }

    async fn acquire(&mut self) -> Result<()> {
        // Never hold two streams
        self.release_stream();
        self.state = CaptureState::Acquiring;

        match self
            .camera
            .open_stream(StreamRequest::new(self.policy.facing))
            .await
        {
            Ok(stream) => {
                let (width, height) = stream.resolution();
                debug!(stream_id = stream.id(), width, height, "Camera live");
                self.stream = Some(stream);
                self.state = CaptureState::Live;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Camera unavailable");
                self.state = CaptureState::Idle;
                Err(e.into())
            }
        }
    }

    fn release_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.camera.release(stream);
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            warn!(stream_id = stream.id(), "Releasing camera stream on drop");
            self.camera.release(stream);
        }
    }
}

fn invalid_transition(op: &str, state: CaptureState) -> AttendanceError {
    AttendanceError::validation(format!("cannot {} while camera is {}", op, state))
}
