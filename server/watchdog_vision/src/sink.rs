use crate::audio::SinkAudio;
use crate::error::StreamError;
use crate::frame::{Frame, PixelFormat};

/// Remote media server session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub url: String,
    /// Output size, after `scale` has been applied.
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub audio_sample_rate: u32,
    /// Downscale applied to captured frames before they reach the sink.
    pub scale: u32,
}

/// A frame ready for encoding.
#[derive(Debug)]
pub struct SinkFrame {
    pub frame: Frame,
    /// Microseconds since the session started.
    pub timestamp_us: u64,
}

/// The encoder/uploader behind the [`crate::StreamPusher`].
pub trait MediaSink: Send {
    fn configure(&mut self, settings: &StreamSettings) -> Result<(), StreamError>;

    /// Connects to the remote server.
    fn start(&mut self) -> Result<(), StreamError>;

    /// Encodes and sends one frame, `false` on failure.
    fn push(&mut self, frame: &SinkFrame) -> bool;

    /// Sends one block of microphone samples, `false` on failure.
    fn push_audio(&mut self, audio: &SinkAudio) -> bool;

    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Pixel format the sink wants frames in.
    fn input_format(&self) -> PixelFormat {
        PixelFormat::Gray8
    }
}
