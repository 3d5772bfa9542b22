use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use thiserror::Error;
use watchdog_common::ConfigError;
use watchdog_common::camera::{CameraDefinition, MotionConfig};
use watchdog_common::stream::StreamConfig;
use watchdog_shared::InspectStatus;
use watchdog_vision::{CameraError, CaptureGeneration, FrameSource, StreamError, StreamPusher, StreamSettings};

use crate::alarm::{AlarmController, Siren};
use crate::config::Config;

pub mod state;

pub use state::DeviceState;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// The shared device: camera power, alarm and streaming, serialized by one lock.
///
/// Pixel work never happens under the lock, the frame worker only takes it to report
/// motion and the stream pusher is driven without it.
pub struct Device {
    inner: Mutex<DeviceInner>,
    /// Advanced whenever the detector must re-baseline, frames from older generations are stale.
    generation: CaptureGeneration,
    pusher: Arc<StreamPusher>,
}

struct DeviceInner {
    camera: Box<dyn FrameSource>,
    definition: CameraDefinition,
    motion: MotionConfig,
    stream: StreamConfig,
    flash_on: bool,
    alarm: AlarmController,
}

pub fn stream_settings(motion: &MotionConfig, stream: &StreamConfig) -> StreamSettings {
    let (width, height) = stream.output_size(motion);
    StreamSettings {
        url: stream.url.clone(),
        width,
        height,
        frame_rate: motion.frame_rate,
        audio_sample_rate: stream.audio_sample_rate,
        scale: stream.scale,
    }
}

impl Device {
    /// `generation` must be the one the camera stamps its frames with.
    pub fn new(
        config: &Config,
        camera: Box<dyn FrameSource>,
        generation: CaptureGeneration,
        pusher: Arc<StreamPusher>,
        siren: Box<dyn Siren>,
    ) -> Self {
        pusher.configure(stream_settings(&config.motion, &config.stream));

        Self {
            inner: Mutex::new(DeviceInner {
                camera,
                definition: config.camera.clone(),
                motion: config.motion,
                stream: config.stream.clone(),
                flash_on: false,
                alarm: AlarmController::new(siren),
            }),
            generation,
            pusher,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceInner> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Called after the camera call, so frames still queued from before carry the old generation.
    fn bump_epoch(&self) {
        self.generation.advance();
    }

    /// Opens the camera, re-opening only when the flash setting differs.
    pub fn open_camera(&self, flash: bool) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        if inner.camera.is_open() && inner.flash_on == flash {
            debug!("Camera already open. flash: {}", flash);
            return Ok(());
        }

        let DeviceInner {
            camera,
            definition,
            ..
        } = &mut *inner;
        if let Err(e) = camera.open(&definition.camera_id, definition.mode, flash) {
            warn!("Unable to open camera. id: {}, error: {}", definition.camera_id, e);
            inner.flash_on = false;
            return Err(e.into());
        }

        inner.flash_on = flash;
        // no stale reference may survive a close/open cycle
        self.bump_epoch();
        info!("Camera open. id: {}, flash: {}", inner.definition.camera_id, flash);
        Ok(())
    }

    pub fn close_camera(&self) {
        let mut inner = self.lock();
        if inner.camera.is_open() {
            inner.camera.close();
            info!("Camera closed. id: {}", inner.definition.camera_id);
        }
        inner.flash_on = false;
        // the detector stops, so does any alarm it caused
        inner.alarm.on_motion_signal(false);
        self.bump_epoch();
    }

    /// Applies new capture geometry and detection tuning.
    pub fn change_config(&self, config: MotionConfig) -> Result<(), DeviceError> {
        config.validate()?;

        let mut inner = self.lock();
        inner.stream.validate(&config)?;
        if !inner
            .definition
            .supports(config.width, config.height)
        {
            warn!(
                "Camera does not list {}x{} as a supported size. id: {}",
                config.width, config.height, inner.definition.camera_id
            );
        }

        inner.motion = config;
        let result = inner.camera.change_config(&config);
        self.pusher
            .configure(stream_settings(&inner.motion, &inner.stream));
        self.bump_epoch();
        info!(
            "Motion config changed. size: {}x{}, fps: {}, scale: {}, threshold: {}",
            config.width, config.height, config.frame_rate, config.scale, config.diff_threshold
        );
        result.map_err(DeviceError::from)
    }

    pub fn set_auto_warning(&self, enabled: bool) {
        self.lock()
            .alarm
            .set_auto_warning(enabled);
    }

    pub fn start_streaming(&self) -> Result<(), DeviceError> {
        let _inner = self.lock();
        self.pusher.start()?;
        Ok(())
    }

    pub fn stop_streaming(&self) {
        let _inner = self.lock();
        self.pusher.stop();
    }

    /// Operator override of the alarm, playing always raises the volume first.
    pub fn sound_warning(&self, play: bool) {
        let mut inner = self.lock();
        if play {
            inner.alarm.out_loud();
            inner.alarm.force_play();
        } else {
            inner.alarm.force_pause();
        }
    }

    /// Reports a detector result, ignored when it belongs to an earlier epoch.
    pub fn on_motion_signal(&self, epoch: u64, moved: bool) {
        let mut inner = self.lock();
        if epoch != self.detector_epoch() || !inner.camera.is_open() {
            debug!("Ignoring stale motion signal. epoch: {}, moved: {}", epoch, moved);
            return;
        }
        inner.alarm.on_motion_signal(moved);
    }

    pub fn detector_epoch(&self) -> u64 {
        self.generation.current()
    }

    pub fn motion_config(&self) -> MotionConfig {
        self.lock().motion
    }

    pub fn pusher(&self) -> &Arc<StreamPusher> {
        &self.pusher
    }

    pub fn state(&self) -> DeviceState {
        let inner = self.lock();
        DeviceState {
            camera_open: inner.camera.is_open(),
            flash_on: inner.flash_on,
            auto_warning_enabled: inner.alarm.auto_warning(),
            streaming: self.pusher.is_active(),
            alarm_playing: inner.alarm.is_playing(),
        }
    }

    pub fn status(&self) -> InspectStatus {
        self.state().to_status()
    }

    /// Best-effort release of every resource, in pipeline order.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.camera.is_open() {
            inner.camera.close();
        }
        inner.flash_on = false;
        self.bump_epoch();
        self.pusher.stop();
        inner.alarm.close();
        info!("Device shut down");
    }
}
