use log::info;

pub mod beep;

/// Something that can make noise.
pub trait Siren: Send {
    /// Starts sounding, a no-op while already sounding.
    fn play(&mut self);

    /// Stops sounding, a no-op while silent.
    fn pause(&mut self);

    /// Raises the output volume to maximum.
    fn out_loud(&mut self);

    /// Releases the output, no further sound is produced.
    fn close(&mut self);
}

/// Why the alarm is currently sounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCause {
    Idle,
    Motion,
    Manual,
}

/// Starts and stops the siren from motion signals and operator overrides.
///
/// No debouncing is applied, the siren follows the latest motion signal exactly.
pub struct AlarmController {
    siren: Box<dyn Siren>,
    auto_warning: bool,
    last_motion: bool,
    cause: AlarmCause,
}

impl AlarmController {
    pub fn new(siren: Box<dyn Siren>) -> Self {
        Self {
            siren,
            auto_warning: false,
            last_motion: false,
            cause: AlarmCause::Idle,
        }
    }

    pub fn on_motion_signal(&mut self, moved: bool) {
        self.last_motion = moved;
        if self.auto_warning {
            self.follow_motion();
        }
    }

    pub fn set_auto_warning(&mut self, enabled: bool) {
        if self.auto_warning != enabled {
            info!("Auto warning {}", if enabled { "enabled" } else { "disabled" });
        }
        self.auto_warning = enabled;
        if enabled {
            self.follow_motion();
        } else {
            self.silence();
        }
    }

    pub fn force_play(&mut self) {
        self.sound(AlarmCause::Manual);
    }

    pub fn force_pause(&mut self) {
        self.silence();
    }

    pub fn out_loud(&mut self) {
        self.siren.out_loud();
    }

    pub fn close(&mut self) {
        self.silence();
        self.siren.close();
    }

    pub fn auto_warning(&self) -> bool {
        self.auto_warning
    }

    pub fn last_motion(&self) -> bool {
        self.last_motion
    }

    pub fn cause(&self) -> AlarmCause {
        self.cause
    }

    pub fn is_playing(&self) -> bool {
        self.cause != AlarmCause::Idle
    }

    fn follow_motion(&mut self) {
        if self.last_motion {
            self.sound(AlarmCause::Motion);
        } else {
            self.silence();
        }
    }

    fn sound(&mut self, cause: AlarmCause) {
        if self.cause == AlarmCause::Idle {
            info!("Alarm playing. cause: {:?}", cause);
            self.siren.play();
        }
        self.cause = cause;
    }

    fn silence(&mut self) {
        if self.cause != AlarmCause::Idle {
            info!("Alarm paused. cause: {:?}", self.cause);
            self.siren.pause();
        }
        self.cause = AlarmCause::Idle;
    }
}
