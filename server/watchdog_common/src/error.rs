use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{width}x{height} is not divisible by scale factor {scale}")]
    IndivisibleDimensions { width: u32, height: u32, scale: u32 },
    #[error("jpeg quality must be within 1..=100, got {0}")]
    JpegQuality(u8),
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be at most {max} bytes")]
    TooLong { field: &'static str, max: usize },
    #[error("stream scale {scale} reduces {width}x{height} to nothing")]
    StreamTooSmall { width: u32, height: u32, scale: u32 },
    #[error("initial volume must be within 0.0..=1.0")]
    Volume,
    #[error("unable to read config file '{path}': {reason}")]
    Read { path: String, reason: String },
    #[error("unable to parse config file: {0}")]
    Parse(String),
}
