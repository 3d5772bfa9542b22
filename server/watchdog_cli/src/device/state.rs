use watchdog_shared::{InspectStatus, MotionFlags, StreamFlags};

/// Snapshot of the device flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceState {
    pub camera_open: bool,
    pub flash_on: bool,
    pub auto_warning_enabled: bool,
    pub streaming: bool,
    pub alarm_playing: bool,
}

impl DeviceState {
    pub fn to_status(self) -> InspectStatus {
        let motion = MotionFlags::empty()
            .with(MotionFlags::CAMERA, self.camera_open)
            // flash only means something while the camera is powered
            .with(MotionFlags::FLASH_LIGHT, self.camera_open && self.flash_on)
            .with(MotionFlags::AUTO_WARNING, self.auto_warning_enabled);
        let stream = StreamFlags::empty()
            .with(StreamFlags::RTMP_VIDEO, self.streaming)
            .with(StreamFlags::WARNING_SOUND, self.alarm_playing);

        InspectStatus {
            motion,
            stream,
        }
    }
}
