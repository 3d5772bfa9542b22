use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hello fields carry a u16 length prefix.
pub const MAX_HELLO_FIELD: usize = u16::MAX as usize;

/// Remote command channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// `host:port` of the broker the device dials out to.
    pub host: String,
    pub username: String,
    pub password: String,
    pub queue: String,
    pub reconnect_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:5672".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            queue: "housedog".to_string(),
            reconnect_delay_ms: 5000,
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "host",
            });
        }
        if self.queue.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "queue",
            });
        }
        for (field, value) in [
            ("queue", &self.queue),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.len() > MAX_HELLO_FIELD {
                return Err(ConfigError::TooLong {
                    field,
                    max: MAX_HELLO_FIELD,
                });
            }
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
