//! Camera capabilities model

use rollcall_api::CameraFacing;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Describes what a camera device can do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraCapabilities {
    /// Which way the available lenses point
    pub facings_supported: HashSet<CameraFacing>,

    /// Native frame size as (width, height)
    pub native_resolution: (u32, u32),

    /// Frames change over time (a live sensor rather than a fixed image)
    pub live_preview: bool,
}

impl CameraCapabilities {
    /// A single front-facing camera
    pub fn front_only(width: u32, height: u32) -> Self {
        let mut facings = HashSet::new();
        facings.insert(CameraFacing::User);

        Self {
            facings_supported: facings,
            native_resolution: (width, height),
            live_preview: true,
        }
    }

    /// Front and rear cameras
    pub fn front_and_rear(width: u32, height: u32) -> Self {
        let mut caps = Self::front_only(width, height);
        caps.facings_supported.insert(CameraFacing::Environment);
        caps
    }

    /// Check if the device has a lens facing the given way
    pub fn supports_facing(&self, facing: CameraFacing) -> bool {
        self.facings_supported.contains(&facing)
    }
}

impl Default for CameraCapabilities {
    fn default() -> Self {
        Self::front_only(640, 480)
    }
}
