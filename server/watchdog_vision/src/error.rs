use thiserror::Error;

use crate::frame::PixelFormat;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("buffer length mismatch. expected: {expected}, actual: {actual}, size: {width}x{height}, format: {format:?}")]
    BufferLength {
        width: u32,
        height: u32,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
    #[error("frame has no pixels. size: {width}x{height}")]
    Empty { width: u32, height: u32 },
}

/// Frame source and detector disagree about the frame layout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("frame geometry mismatch. expected: {expected_width}x{expected_height}, actual: {width}x{height}")]
    GeometryMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("unknown camera. id: '{0}'")]
    UnknownCamera(String),
    #[error("camera access denied. id: '{0}'")]
    AccessDenied(String),
    #[error("camera failure: {0}")]
    Failure(String),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream url: '{0}'")]
    InvalidUrl(String),
    #[error("stream is not configured")]
    NotConfigured,
    #[error("media sink is unavailable")]
    SinkUnavailable,
    #[error("unable to connect. url: '{url}', error: {source}")]
    Connect {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stream write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("stream encoding failed: {0}")]
    Encode(String),
}
