use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace};
use tokio::select;
use tokio::sync::broadcast::Receiver;
use watchdog_vision::{Frame, FrameReceiver, MotionDetector};

use crate::device::Device;
use crate::{AppEvent, app_shutdown_handler};

/// Drops frames that arrive faster than the configured frame rate.
#[derive(Debug)]
pub struct FrameThrottle {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        self.last_accepted = None;
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }
}

/// What happened to a frame handed to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Captured before the last camera open or config change.
    Stale,
    Throttled,
    Halted,
    Processed { moved: bool },
}

/// Per-frame work: throttle, detect, report motion, forward to the stream pusher.
///
/// Owns the detector, so no lock is held during pixel processing.
pub struct FramePipeline {
    device: Arc<Device>,
    detector: MotionDetector,
    throttle: FrameThrottle,
    epoch: u64,
    halted: bool,
    last_moved: bool,
}

impl FramePipeline {
    pub fn new(device: Arc<Device>) -> Self {
        let epoch = device.detector_epoch();
        let config = device.motion_config();
        Self {
            device,
            detector: MotionDetector::new(config),
            throttle: FrameThrottle::new(config.frame_interval()),
            epoch,
            halted: false,
            last_moved: false,
        }
    }

    fn rebaseline(&mut self, epoch: u64) {
        let config = self.device.motion_config();
        self.detector.reconfigure(config);
        self.detector.reset();
        self.throttle
            .set_interval(config.frame_interval());
        self.epoch = epoch;
        self.halted = false;
        self.last_moved = false;
        debug!("Detector re-baselined. epoch: {}", epoch);
    }

    pub fn on_frame(&mut self, frame: Frame, now: Instant) -> FrameOutcome {
        let epoch = self.device.detector_epoch();
        if epoch != self.epoch {
            self.rebaseline(epoch);
        }

        if frame.generation() != self.epoch {
            trace!(
                "Dropping frame from an earlier capture. sequence: {}, generation: {}, epoch: {}",
                frame.sequence(),
                frame.generation(),
                self.epoch
            );
            return FrameOutcome::Stale;
        }
        if self.halted {
            return FrameOutcome::Halted;
        }
        if !self.throttle.accept(now) {
            trace!("Frame throttled. sequence: {}", frame.sequence());
            return FrameOutcome::Throttled;
        }

        let detect_start = Instant::now();
        let detection = match self.detector.process(frame) {
            Ok(detection) => detection,
            Err(e) => {
                error!("Motion detection halted until reconfigured: {}", e);
                self.halted = true;
                return FrameOutcome::Halted;
            }
        };
        let detect_duration = detect_start.elapsed();

        if detection.moved != self.last_moved {
            debug!(
                "Motion {}. sequence: {}, peak: {}, changed: {}",
                if detection.moved { "started" } else { "stopped" },
                detection.source.sequence(),
                detection.score.peak,
                detection.score.changed
            );
            self.last_moved = detection.moved;
        }
        self.device
            .on_motion_signal(self.epoch, detection.moved);

        let sequence = detection.source.sequence();
        let push_start = Instant::now();
        self.device
            .pusher()
            .push(detection.source);

        trace!(
            "Frame processed. sequence: {}, moved: {}, detect_duration: {}us, push_duration: {}us",
            sequence,
            detection.moved,
            detect_duration.as_micros(),
            push_start.elapsed().as_micros()
        );

        FrameOutcome::Processed {
            moved: detection.moved,
        }
    }
}

/// Feeds frames from the camera through the pipeline until shutdown.
pub async fn frame_worker(mut pipeline: FramePipeline, mut frames: FrameReceiver, app_event_rx: Receiver<AppEvent>) {
    let mut app_shutdown_handler = Box::pin(app_shutdown_handler(app_event_rx));
    info!("Frame worker started");

    loop {
        select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    info!("Frame channel closed");
                    break
                };
                pipeline.on_frame(frame, Instant::now());
            }
            _ = &mut app_shutdown_handler => {
                info!("frame worker shutdown requested, stopping");
                break
            }
        }
    }
}
