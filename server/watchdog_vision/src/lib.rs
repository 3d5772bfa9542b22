pub mod audio;
pub mod convert;
pub mod detector;
pub mod error;
pub mod frame;
pub mod pusher;
pub mod sink;
pub mod source;
pub mod synthetic;
pub mod tcp_sink;

pub use audio::{AudioSource, SinkAudio};
pub use detector::{Detection, MotionDetector, MotionScore};
pub use error::{CameraError, DetectorError, FrameError, StreamError};
pub use frame::{Frame, PixelFormat};
pub use pusher::{PushStats, PusherState, StreamPusher};
pub use sink::{MediaSink, SinkFrame, StreamSettings};
pub use source::{CaptureGeneration, FrameReceiver, FrameSender, FrameSource, frame_channel};
