use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDefinition {
    pub camera_id: String,
    pub mode: CaptureMode,
    /// Resolutions the camera is known to deliver, an empty list disables the check.
    #[serde(default)]
    pub supported_sizes: Vec<(u32, u32)>,
}

impl CameraDefinition {
    pub fn supports(&self, width: u32, height: u32) -> bool {
        self.supported_sizes.is_empty()
            || self
                .supported_sizes
                .contains(&(width, height))
    }
}

impl Default for CameraDefinition {
    fn default() -> Self {
        Self {
            camera_id: "0".to_string(),
            mode: CaptureMode::Record,
            supported_sizes: Vec::new(),
        }
    }
}

/// Capture request template used when opening the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    Preview,
    Record,
    StillCapture,
    ZeroShutterLag,
}

impl Display for CaptureMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Capture geometry and motion detection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Integer downscale applied before comparing frames.
    pub scale: u32,
    /// A frame pair counts as motion when the largest per-pixel luminance delta exceeds this.
    pub diff_threshold: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 10,
            scale: 8,
            diff_threshold: 150,
        }
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("width", self.width),
            ("height", self.height),
            ("frame_rate", self.frame_rate),
            ("scale", self.scale),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero {
                    field,
                });
            }
        }

        if self.width % self.scale != 0 || self.height % self.scale != 0 {
            return Err(ConfigError::IndivisibleDimensions {
                width: self.width,
                height: self.height,
                scale: self.scale,
            });
        }

        Ok(())
    }

    /// Size of the frames the detector compares.
    pub fn scaled_size(&self) -> (u32, u32) {
        (self.width / self.scale, self.height / self.scale)
    }

    /// Minimum spacing between frames handed to the detector.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.frame_rate.max(1)))
    }
}
