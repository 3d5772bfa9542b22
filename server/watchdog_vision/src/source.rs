use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use watchdog_common::camera::{CaptureMode, MotionConfig};

use crate::error::CameraError;
use crate::frame::Frame;

/// A camera, or anything that behaves like one.
///
/// Implementations deliver frames through the [`FrameSender`] they were built with.
pub trait FrameSource: Send {
    /// Opens the camera, closing it first if it is already open.
    fn open(&mut self, camera_id: &str, mode: CaptureMode, flash: bool) -> Result<(), CameraError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Applies new capture geometry, restarting capture if the camera is open.
    fn change_config(&mut self, config: &MotionConfig) -> Result<(), CameraError>;
}

pub type FrameReceiver = mpsc::Receiver<Frame>;

/// Shared counter naming the current capture session.
///
/// Advanced by the owner of the camera whenever frames captured so far must no longer
/// be compared with new ones.
#[derive(Debug, Clone, Default)]
pub struct CaptureGeneration(Arc<AtomicU64>);

impl CaptureGeneration {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Starts a new generation and returns it.
    pub fn advance(&self) -> u64 {
        self.0
            .fetch_add(1, Ordering::AcqRel)
            + 1
    }
}

/// Bounded frame channel, the source side never blocks.
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        FrameSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            generation: CaptureGeneration::default(),
        },
        rx,
    )
}

#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Frame>,
    dropped: Arc<AtomicU64>,
    generation: CaptureGeneration,
}

impl FrameSender {
    /// The generation stamped onto every delivered frame.
    pub fn generation(&self) -> CaptureGeneration {
        self.generation.clone()
    }

    /// Stamps the frame with the current generation and hands it to the worker,
    /// dropping it if the worker is still busy.
    ///
    /// Returns `false` once the receiving side is gone.
    pub fn deliver(&self, frame: Frame) -> bool {
        let frame = frame.with_generation(self.generation.current());
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                let dropped = self
                    .dropped
                    .fetch_add(1, Ordering::Relaxed)
                    + 1;
                trace!("Frame worker busy, dropping frame. sequence: {}, dropped: {}", frame.sequence(), dropped);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
