use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    pub frequency_hz: u32,
    pub sample_rate_hz: u32,
    /// Gain used until the warning sound command raises it to maximum, 0.0..=1.0.
    pub initial_volume: f32,
    /// Raw S16LE mono samples are written here, e.g. a FIFO read by `aplay`. `None` discards them.
    #[serde(default)]
    pub pcm_output: Option<PathBuf>,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 1000,
            sample_rate_hz: 44100,
            initial_volume: 0.5,
            pcm_output: None,
        }
    }
}

impl AlarmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency_hz == 0 {
            return Err(ConfigError::Zero {
                field: "frequency_hz",
            });
        }
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::Zero {
                field: "sample_rate_hz",
            });
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(ConfigError::Volume);
        }
        Ok(())
    }
}
