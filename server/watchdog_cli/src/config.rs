use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use watchdog_common::ConfigError;
use watchdog_common::alarm::AlarmConfig;
use watchdog_common::broker::BrokerConfig;
use watchdog_common::camera::{CameraDefinition, MotionConfig};
use watchdog_common::stream::StreamConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraDefinition,
    pub motion: MotionConfig,
    pub stream: StreamConfig,
    pub broker: BrokerConfig,
    pub alarm: AlarmConfig,
    /// Wait before answering a status inspection, lets hardware catch up with the previous command.
    pub settle_delay_ms: u64,
    /// Frames buffered between the camera and the frame worker.
    pub frame_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraDefinition::default(),
            motion: MotionConfig::default(),
            stream: StreamConfig::default(),
            broker: BrokerConfig::default(),
            alarm: AlarmConfig::default(),
            settle_delay_ms: 500,
            frame_queue_depth: 2,
        }
    }
}

impl Config {
    /// Loads and validates a config file, a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config file not found, using defaults. path: {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::parse(&content)?;
        info!("Config loaded. path: {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = ron::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.camera_id.is_empty() {
            return Err(ConfigError::Empty {
                field: "camera_id",
            });
        }
        self.motion.validate()?;
        self.stream.validate(&self.motion)?;
        self.broker.validate()?;
        self.alarm.validate()?;
        if self.frame_queue_depth == 0 {
            return Err(ConfigError::Zero {
                field: "frame_queue_depth",
            });
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn to_pretty_ron(&self) -> anyhow::Result<String> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }
}
