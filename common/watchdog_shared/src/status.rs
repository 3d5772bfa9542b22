use crate::commands::CommandId;
use crate::flags::{MotionFlags, StreamFlags};

/// Byte 0 of the `INSPECT_STATUS` response.
pub const STATUS_MARKER: u8 = CommandId::InspectStatus as u8;

pub const STATUS_LEN: usize = 3;

/// The fixed-layout `INSPECT_STATUS` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InspectStatus {
    pub motion: MotionFlags,
    pub stream: StreamFlags,
}

impl InspectStatus {
    pub fn to_bytes(self) -> [u8; STATUS_LEN] {
        [STATUS_MARKER, self.motion.bits(), self.stream.bits()]
    }

    /// `None` unless `bytes` is exactly a status response.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [STATUS_MARKER, motion, stream] => Some(Self {
                motion: MotionFlags::from_bits_truncate(*motion),
                stream: StreamFlags::from_bits_truncate(*stream),
            }),
            _ => None,
        }
    }
}
