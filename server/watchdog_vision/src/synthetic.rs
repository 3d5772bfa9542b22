use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use watchdog_common::camera::{CaptureMode, MotionConfig};

use crate::error::CameraError;
use crate::frame::{Frame, PixelFormat};
use crate::source::{FrameSender, FrameSource};

const FLASH_BOOST: u8 = 64;
const BLOCK_VALUE: u8 = 255;

/// Test-pattern camera.
///
/// Renders a dark gradient with a bright block that jumps to a new position every
/// `motion_period` frames, a period of 0 keeps the block still.
pub struct SyntheticCamera {
    sender: FrameSender,
    config: MotionConfig,
    motion_period: u32,
    session: Option<Session>,
}

struct Session {
    camera_id: String,
    mode: CaptureMode,
    flash: bool,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SyntheticCamera {
    pub fn new(sender: FrameSender, config: MotionConfig, motion_period: u32) -> Self {
        Self {
            sender,
            config,
            motion_period,
            session: None,
        }
    }

    fn start(&mut self, camera_id: &str, mode: CaptureMode, flash: bool) -> Result<(), CameraError> {
        let stop = Arc::new(AtomicBool::new(false));
        let pattern = Pattern {
            config: self.config,
            motion_period: self.motion_period,
            flash,
        };

        let handle = thread::Builder::new()
            .name(format!("camera-{}/capture", camera_id))
            .spawn({
                let sender = self.sender.clone();
                let stop = stop.clone();
                move || capture_loop(pattern, sender, stop)
            })
            .map_err(|e| CameraError::Failure(e.to_string()))?;

        info!(
            "Synthetic camera opened. id: {}, mode: {}, flash: {}, size: {}x{}, fps: {}",
            camera_id, mode, flash, self.config.width, self.config.height, self.config.frame_rate
        );

        self.session = Some(Session {
            camera_id: camera_id.to_string(),
            mode,
            flash,
            stop,
            handle,
        });
        Ok(())
    }

    /// Stops capture, returning what is needed to start it again.
    fn stop(&mut self) -> Option<(String, CaptureMode, bool)> {
        let Session {
            camera_id,
            mode,
            flash,
            stop,
            handle,
        } = self.session.take()?;
        stop.store(true, Ordering::Relaxed);
        if handle.join().is_err() {
            error!("Synthetic camera capture thread panicked. id: {}", camera_id);
        }
        Some((camera_id, mode, flash))
    }
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self, camera_id: &str, mode: CaptureMode, flash: bool) -> Result<(), CameraError> {
        if camera_id.is_empty() {
            return Err(CameraError::UnknownCamera(camera_id.to_string()));
        }
        self.close();
        self.start(camera_id, mode, flash)
    }

    fn close(&mut self) {
        if let Some((camera_id, ..)) = self.stop() {
            info!("Synthetic camera closed. id: {}", camera_id);
        }
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn change_config(&mut self, config: &MotionConfig) -> Result<(), CameraError> {
        self.config = *config;
        if let Some((camera_id, mode, flash)) = self.stop() {
            debug!("Restarting synthetic camera with new configuration. id: {}", camera_id);
            self.start(&camera_id, mode, flash)?;
        }
        Ok(())
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy)]
struct Pattern {
    config: MotionConfig,
    motion_period: u32,
    flash: bool,
}

impl Pattern {
    fn render(&self, sequence: u64) -> Vec<u8> {
        let MotionConfig {
            width,
            height,
            ..
        } = self.config;
        let boost = if self.flash { FLASH_BOOST } else { 0 };

        let block_width = (width / 8).max(1);
        let block_height = (height / 8).max(1);
        let position = match self.motion_period {
            0 => 0,
            period => sequence / u64::from(period),
        };
        // walk the block around a 4x4 grid of cells
        let cell = (position % 16) as u32;
        let block_x = (cell % 4) * (width / 4);
        let block_y = (cell / 4) * (height / 4);

        let mut data = Vec::with_capacity(Frame::expected_len(width, height, PixelFormat::Rgb8));
        for y in 0..height {
            for x in 0..width {
                let in_block =
                    (block_x..block_x + block_width).contains(&x) && (block_y..block_y + block_height).contains(&y);
                let value = if in_block {
                    BLOCK_VALUE
                } else {
                    (x * 64 / width) as u8 + boost
                };
                data.extend_from_slice(&[value, value, value]);
            }
        }
        data
    }
}

fn capture_loop(pattern: Pattern, sender: FrameSender, stop: Arc<AtomicBool>) {
    let interval = Duration::from_secs_f64(1.0 / f64::from(pattern.config.frame_rate.max(1)));
    let mut next_frame_at = Instant::now();
    let mut sequence = 0_u64;

    while !stop.load(Ordering::Relaxed) {
        let data = pattern.render(sequence);
        let frame = match Frame::new(
            pattern.config.width,
            pattern.config.height,
            PixelFormat::Rgb8,
            data,
            sequence,
            chrono::Utc::now(),
        ) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Synthetic camera produced an invalid frame: {}", e);
                break;
            }
        };

        if !sender.deliver(frame) {
            debug!("Frame receiver closed, stopping synthetic capture");
            break;
        }
        sequence += 1;

        next_frame_at += interval;
        let now = Instant::now();
        if next_frame_at > now {
            thread::sleep(next_frame_at - now);
        } else {
            // catch up if we fall behind
            next_frame_at = now;
        }
    }
}
