//! Wire format shared by the watchdog device and its remote operators.
//!
//! Every command is a short byte sequence: byte 0 names the command, byte 1 (optional) carries its
//! argument. A missing argument byte means "all flags clear".

pub mod commands;
pub mod envelope;
pub mod flags;
pub mod status;

pub use commands::{Command, CommandId};
pub use flags::{MotionFlags, StreamFlags};
pub use status::InspectStatus;

/// Lowercase hex rendering used when logging raw messages, e.g. `[0x01, 0x06]` -> `"0106"`.
pub fn to_hex(bytes: &[u8]) -> String {
    use core::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
