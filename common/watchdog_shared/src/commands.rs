use core::fmt::{Display, Formatter};

use crate::flags::MotionFlags;

/// Byte 0 of every command message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandId {
    MotionDetection = 1,
    RtmpVideo = 2,
    WarningSound = 3,
    InspectStatus = 4,
}

impl TryFrom<u8> for CommandId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::MotionDetection),
            2 => Ok(Self::RtmpVideo),
            3 => Ok(Self::WarningSound),
            4 => Ok(Self::InspectStatus),
            other => Err(other),
        }
    }
}

impl From<CommandId> for u8 {
    fn from(value: CommandId) -> Self {
        value as u8
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            CommandId::MotionDetection => "MOTION_DETECTION",
            CommandId::RtmpVideo => "RTMP_VIDEO",
            CommandId::WarningSound => "WARNING_SOUND",
            CommandId::InspectStatus => "INSPECT_STATUS",
        };
        f.write_str(name)
    }
}

/// A decoded command message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MotionDetection(MotionFlags),
    RtmpVideo { enabled: bool },
    WarningSound { play: bool },
    InspectStatus,
    /// Unrecognised command byte, answered with an echo.
    Unknown(u8),
}

impl Command {
    /// Decodes a message, `None` for an empty message.
    ///
    /// Bytes after the argument byte are ignored.
    pub fn parse(message: &[u8]) -> Option<Self> {
        let (&id, rest) = message.split_first()?;
        let argument = rest.first().copied().unwrap_or(0);

        let command = match CommandId::try_from(id) {
            Ok(CommandId::MotionDetection) => Command::MotionDetection(MotionFlags::from_bits_truncate(argument)),
            Ok(CommandId::RtmpVideo) => Command::RtmpVideo {
                enabled: argument != 0,
            },
            Ok(CommandId::WarningSound) => Command::WarningSound {
                play: argument != 0,
            },
            Ok(CommandId::InspectStatus) => Command::InspectStatus,
            Err(unknown) => Command::Unknown(unknown),
        };

        Some(command)
    }

    pub fn id(&self) -> Option<CommandId> {
        match self {
            Command::MotionDetection(_) => Some(CommandId::MotionDetection),
            Command::RtmpVideo { .. } => Some(CommandId::RtmpVideo),
            Command::WarningSound { .. } => Some(CommandId::WarningSound),
            Command::InspectStatus => Some(CommandId::InspectStatus),
            Command::Unknown(_) => None,
        }
    }

    /// Encodes the command the way an operator sends it.
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            Command::MotionDetection(flags) => vec![CommandId::MotionDetection.into(), flags.bits()],
            Command::RtmpVideo { enabled } => vec![CommandId::RtmpVideo.into(), u8::from(enabled)],
            Command::WarningSound { play } => vec![CommandId::WarningSound.into(), u8::from(play)],
            Command::InspectStatus => vec![CommandId::InspectStatus.into()],
            Command::Unknown(id) => vec![id],
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Command::MotionDetection(flags) => write!(f, "{} [{}]", CommandId::MotionDetection, flags),
            Command::RtmpVideo { enabled } => write!(f, "{} [enabled: {}]", CommandId::RtmpVideo, enabled),
            Command::WarningSound { play } => write!(f, "{} [play: {}]", CommandId::WarningSound, play),
            Command::InspectStatus => write!(f, "{}", CommandId::InspectStatus),
            Command::Unknown(id) => write!(f, "UNKNOWN(0x{:02x})", id),
        }
    }
}
