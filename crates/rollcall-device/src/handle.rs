//! Stream handle abstraction

use chrono::{DateTime, Local};
use image::RgbImage;
use rollcall_api::CameraFacing;

/// What the caller wants from a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: CameraFacing,
}

impl StreamRequest {
    pub fn new(facing: CameraFacing) -> Self {
        Self { facing }
    }
}

/// Open stream on a camera device
///
/// Deliberately neither `Clone` nor `Copy`: ownership of the handle is
/// ownership of the device, and giving it back through
/// `CameraDevice::release` is the only way to end the stream.
#[derive(Debug, PartialEq, Eq)]
pub struct StreamHandle {
    id: u64,
    facing: CameraFacing,
    width: u32,
    height: u32,
}

impl StreamHandle {
    pub fn new(id: u64, facing: CameraFacing, width: u32, height: u32) -> Self {
        Self {
            id,
            facing,
            width,
            height,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    /// Native resolution of the stream as (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A single still frame grabbed from a stream
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: rollcall_util::now(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
