use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::camera::MotionConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Media server address, e.g. `tcp://192.168.1.10:1935`.
    pub url: String,
    /// Integer downscale applied to captured frames before encoding, independent of the motion scale.
    pub scale: u32,
    pub audio_sample_rate: u32,
    /// Raw S16LE mono microphone capture, e.g. a FIFO fed by `arecord`. Silence when unset.
    #[serde(default)]
    pub audio_input: Option<PathBuf>,
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "tcp://127.0.0.1:1935".to_string(),
            scale: 4,
            audio_sample_rate: 44100,
            audio_input: None,
            jpeg_quality: 80,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self, motion: &MotionConfig) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "url",
            });
        }
        if self.scale == 0 {
            return Err(ConfigError::Zero {
                field: "stream scale",
            });
        }
        if self.audio_sample_rate == 0 {
            return Err(ConfigError::Zero {
                field: "audio_sample_rate",
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::JpegQuality(self.jpeg_quality));
        }
        let (width, height) = self.output_size(motion);
        if width == 0 || height == 0 {
            return Err(ConfigError::StreamTooSmall {
                width: motion.width,
                height: motion.height,
                scale: self.scale,
            });
        }
        Ok(())
    }

    /// Size of the frames sent to the media server.
    pub fn output_size(&self, motion: &MotionConfig) -> (u32, u32) {
        let scale = self.scale.max(1);
        (motion.width / scale, motion.height / scale)
    }
}
