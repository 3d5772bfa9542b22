pub mod alarm;
pub mod broker;
pub mod camera;
pub mod error;
pub mod stream;

pub use error::ConfigError;
