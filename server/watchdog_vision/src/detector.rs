use image::GrayImage;
use log::trace;
use watchdog_common::camera::MotionConfig;

use crate::convert::{downscale, to_gray};
use crate::error::DetectorError;
use crate::frame::{Frame, PixelFormat};

/// Difference between a frame and the reference it was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionScore {
    /// Largest per-pixel luminance delta.
    pub peak: u8,
    /// Pixels whose delta exceeds the threshold.
    pub changed: u32,
}

#[derive(Debug)]
pub struct Detection {
    /// The frame that was processed, handed back so it can continue down the pipeline.
    pub source: Frame,
    /// Grayscale, downscaled copy used for the comparison.
    pub processed: Frame,
    pub moved: bool,
    pub score: MotionScore,
}

/// Rolling-reference frame differencer.
///
/// Every processed frame replaces the reference, so a slow lighting drift never accumulates
/// into a detection while continuous motion produces a run of `moved` results.
pub struct MotionDetector {
    config: MotionConfig,
    reference: Option<GrayImage>,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            reference: None,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Applies a new configuration, the next frame re-baselines if anything changed.
    pub fn reconfigure(&mut self, config: MotionConfig) {
        if self.config != config {
            self.config = config;
            self.reference = None;
        }
    }

    /// Forgets the reference frame, the next frame reports no motion.
    pub fn reset(&mut self) {
        self.reference = None;
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn process(&mut self, frame: Frame) -> Result<Detection, DetectorError> {
        if frame.width() != self.config.width || frame.height() != self.config.height {
            return Err(DetectorError::GeometryMismatch {
                expected_width: self.config.width,
                expected_height: self.config.height,
                width: frame.width(),
                height: frame.height(),
            });
        }

        let current = downscale(to_gray(&frame)?, self.config.scale);

        let score = match &self.reference {
            Some(reference) if reference.dimensions() == current.dimensions() => {
                score(reference, &current, self.config.diff_threshold)
            }
            _ => {
                trace!(
                    "Detector baseline. sequence: {}, size: {}x{}",
                    frame.sequence(),
                    current.width(),
                    current.height()
                );
                MotionScore::default()
            }
        };
        let moved = score.peak > self.config.diff_threshold;

        let processed = Frame::new(
            current.width(),
            current.height(),
            PixelFormat::Gray8,
            current.as_raw().clone(),
            frame.sequence(),
            frame.timestamp(),
        )?;
        self.reference = Some(current);

        Ok(Detection {
            source: frame,
            processed,
            moved,
            score,
        })
    }
}

fn score(reference: &GrayImage, current: &GrayImage, threshold: u8) -> MotionScore {
    reference
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .map(|(a, b)| a.abs_diff(*b))
        .fold(MotionScore::default(), |mut score, delta| {
            score.peak = score.peak.max(delta);
            if delta > threshold {
                score.changed += 1;
            }
            score
        })
}
