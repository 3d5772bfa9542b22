use core::fmt::{Display, Formatter};

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$flag_meta:meta])*
                const $flag:ident = $bit:expr;
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u8);

        impl $name {
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self(1 << $bit);
            )+

            /// Every flag defined for this set.
            pub const ALL: &'static [(&'static str, Self)] = &[$((stringify!($flag), Self::$flag)),+];

            pub const fn empty() -> Self {
                Self(0)
            }

            /// Keeps only the defined bits, unknown bits are ignored.
            pub const fn from_bits_truncate(bits: u8) -> Self {
                Self(bits & (0 $(| (1 << $bit))+))
            }

            pub const fn bits(self) -> u8 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.0 |= other.0;
                } else {
                    self.0 &= !other.0;
                }
            }

            /// Builder-style `set`.
            pub fn with(mut self, other: Self, value: bool) -> Self {
                self.set(other, value);
                self
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
                let mut names = Self::ALL
                    .iter()
                    .filter(|(_, flag)| self.contains(*flag))
                    .map(|(name, _)| *name)
                    .peekable();

                if names.peek().is_none() {
                    return write!(f, "(none)");
                }
                for (index, name) in names.enumerate() {
                    if index > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", name)?;
                }
                Ok(())
            }
        }
    };
}

flag_set! {
    /// Argument of `MOTION_DETECTION`, also byte 1 of the status response.
    pub struct MotionFlags {
        /// Flash light (torch) on while the camera is open.
        const FLASH_LIGHT = 0;
        /// Camera open and motion detection running.
        const CAMERA = 1;
        /// Alarm follows the motion signal.
        const AUTO_WARNING = 2;
    }
}

flag_set! {
    /// Byte 2 of the status response.
    pub struct StreamFlags {
        /// Video is being pushed to the media server.
        const RTMP_VIDEO = 0;
        /// The warning sound is playing.
        const WARNING_SOUND = 1;
    }
}
