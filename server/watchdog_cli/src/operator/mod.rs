use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use watchdog_shared::{Command, MotionFlags, to_hex};

use crate::device::Device;

/// Reply to a message too short to carry a command id.
pub const EMPTY_MESSAGE_REPLY: [u8; 1] = [0x00];

/// Turns inbound command messages into device actions and response bytes.
///
/// Every message gets a response. Apart from `INSPECT_STATUS` the response echoes the
/// request whether or not the action succeeded.
#[derive(Clone)]
pub struct CommandHandler {
    device: Arc<Device>,
    settle_delay: Duration,
}

impl CommandHandler {
    pub fn new(device: Arc<Device>, settle_delay: Duration) -> Self {
        Self {
            device,
            settle_delay,
        }
    }

    pub async fn handle(&self, message: &[u8]) -> Vec<u8> {
        info!("<< {}", to_hex(message));
        let response = self.dispatch(message).await;
        info!(">> {}", to_hex(&response));
        response
    }

    async fn dispatch(&self, message: &[u8]) -> Vec<u8> {
        let Some(command) = Command::parse(message) else {
            warn!("Empty command message");
            return EMPTY_MESSAGE_REPLY.to_vec();
        };
        debug!("Command: {}", command);

        match command {
            Command::MotionDetection(flags) => {
                self.run(move |device| {
                    if flags.contains(MotionFlags::CAMERA) {
                        if let Err(e) = device.open_camera(flags.contains(MotionFlags::FLASH_LIGHT)) {
                            warn!("Camera not opened: {}", e);
                        }
                    } else {
                        device.close_camera();
                    }
                    device.set_auto_warning(flags.contains(MotionFlags::AUTO_WARNING));
                })
                .await;
            }
            Command::RtmpVideo {
                enabled,
            } => {
                self.run(move |device| {
                    if enabled {
                        if let Err(e) = device.start_streaming() {
                            warn!("Streaming not started: {}", e);
                        }
                    } else {
                        device.stop_streaming();
                    }
                })
                .await;
            }
            Command::WarningSound {
                play,
            } => {
                self.run(move |device| device.sound_warning(play))
                    .await;
            }
            Command::InspectStatus => {
                tokio::time::sleep(self.settle_delay).await;
                let status = self.device.status();
                return status.to_bytes().to_vec();
            }
            Command::Unknown(id) => {
                warn!("Unknown command. id: 0x{:02x}", id);
            }
        }

        message.to_vec()
    }

    /// Runs a device action off the async runtime, camera and sink calls may block.
    async fn run<F>(&self, action: F)
    where
        F: FnOnce(&Device) + Send + 'static,
    {
        let device = self.device.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || action(&device)).await {
            error!("Device action failed: {}", e);
        }
    }
}
