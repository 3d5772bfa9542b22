#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use watchdog_cli::alarm::Siren;
use watchdog_cli::camera::{FrameOutcome, FramePipeline};
use watchdog_cli::config::Config;
use watchdog_cli::device::Device;
use watchdog_cli::operator::CommandHandler;
use watchdog_common::camera::{CaptureMode, MotionConfig};
use watchdog_vision::audio::SyntheticMicrophone;
use watchdog_vision::{
    CameraError, CaptureGeneration, Frame, FrameSource, MediaSink, PixelFormat, SinkAudio, SinkFrame, StreamError,
    StreamPusher, StreamSettings,
};

pub const WIDTH: u32 = 32;
pub const HEIGHT: u32 = 16;

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.motion = MotionConfig {
        width: WIDTH,
        height: HEIGHT,
        frame_rate: 10,
        scale: 4,
        diff_threshold: 150,
    };
    config.stream.scale = 2;
    config.settle_delay_ms = 0;
    config
}

#[derive(Debug, Default)]
pub struct CameraLog {
    pub opens: Vec<(String, CaptureMode, bool)>,
    pub closes: u32,
    pub open: bool,
    pub refuse_open: bool,
    pub config: Option<MotionConfig>,
}

/// Records camera calls, frames are injected by the test.
pub struct ManualFrameSource(pub Arc<Mutex<CameraLog>>);

impl FrameSource for ManualFrameSource {
    fn open(&mut self, camera_id: &str, mode: CaptureMode, flash: bool) -> Result<(), CameraError> {
        let mut log = self.0.lock().unwrap();
        if log.refuse_open {
            log.open = false;
            return Err(CameraError::AccessDenied(camera_id.to_string()));
        }
        log.opens
            .push((camera_id.to_string(), mode, flash));
        log.open = true;
        Ok(())
    }

    fn close(&mut self) {
        let mut log = self.0.lock().unwrap();
        if log.open {
            log.closes += 1;
        }
        log.open = false;
    }

    fn is_open(&self) -> bool {
        self.0.lock().unwrap().open
    }

    fn change_config(&mut self, config: &MotionConfig) -> Result<(), CameraError> {
        self.0.lock().unwrap().config = Some(*config);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub connected: AtomicBool,
    pub refuse_connect: AtomicBool,
    pub fail_writes: AtomicBool,
    pub starts: AtomicU64,
    pub frames: Mutex<Vec<(u32, u32, u64)>>,
    pub audio_blocks: AtomicU64,
    pub settings: Mutex<Option<StreamSettings>>,
}

/// Media sink that remembers what it was given.
pub struct RecordingSink(pub Arc<SinkLog>);

impl MediaSink for RecordingSink {
    fn configure(&mut self, settings: &StreamSettings) -> Result<(), StreamError> {
        *self.0.settings.lock().unwrap() = Some(settings.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        if self.0.refuse_connect.load(Ordering::SeqCst) {
            return Err(StreamError::Connect {
                url: "tcp://media.test:1935".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        self.0.starts.fetch_add(1, Ordering::SeqCst);
        self.0.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn push(&mut self, frame: &SinkFrame) -> bool {
        if self.0.fail_writes.load(Ordering::SeqCst) {
            return false;
        }
        self.0
            .frames
            .lock()
            .unwrap()
            .push((frame.frame.width(), frame.frame.height(), frame.frame.sequence()));
        true
    }

    fn push_audio(&mut self, _audio: &SinkAudio) -> bool {
        if self.0.fail_writes.load(Ordering::SeqCst) {
            return false;
        }
        self.0
            .audio_blocks
            .fetch_add(1, Ordering::SeqCst);
        true
    }

    fn stop(&mut self) {
        self.0.connected.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.0.connected.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct SirenLog {
    pub playing: bool,
    pub loud: bool,
    pub plays: u32,
    pub closed: bool,
}

pub struct SilentSiren(pub Arc<Mutex<SirenLog>>);

impl Siren for SilentSiren {
    fn play(&mut self) {
        let mut log = self.0.lock().unwrap();
        log.playing = true;
        log.plays += 1;
    }

    fn pause(&mut self) {
        self.0.lock().unwrap().playing = false;
    }

    fn out_loud(&mut self) {
        self.0.lock().unwrap().loud = true;
    }

    fn close(&mut self) {
        let mut log = self.0.lock().unwrap();
        log.playing = false;
        log.closed = true;
    }
}

pub struct Harness {
    pub device: Arc<Device>,
    pub handler: CommandHandler,
    pub pipeline: FramePipeline,
    pub camera: Arc<Mutex<CameraLog>>,
    pub sink: Arc<SinkLog>,
    pub siren: Arc<Mutex<SirenLog>>,
    clock: Instant,
    sequence: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let camera = Arc::new(Mutex::new(CameraLog::default()));
        let sink = Arc::new(SinkLog::default());
        let siren = Arc::new(Mutex::new(SirenLog::default()));

        let pusher = Arc::new(
            StreamPusher::new(Box::new(RecordingSink(sink.clone())))
                .with_audio(Box::new(SyntheticMicrophone::default())),
        );
        let device = Arc::new(Device::new(
            &config,
            Box::new(ManualFrameSource(camera.clone())),
            CaptureGeneration::default(),
            pusher,
            Box::new(SilentSiren(siren.clone())),
        ));

        Self {
            handler: CommandHandler::new(device.clone(), config.settle_delay()),
            pipeline: FramePipeline::new(device.clone()),
            device,
            camera,
            sink,
            siren,
            clock: Instant::now(),
            sequence: 0,
        }
    }

    pub async fn send(&self, message: &[u8]) -> Vec<u8> {
        self.handler.handle(message).await
    }

    /// Feeds a uniform frame, spaced far enough apart to pass the throttle.
    pub fn feed(&mut self, value: u8) -> FrameOutcome {
        self.feed_sized(WIDTH, HEIGHT, value)
    }

    pub fn feed_sized(&mut self, width: u32, height: u32, value: u8) -> FrameOutcome {
        let frame = self.frame(width, height, value);
        self.feed_frame(frame)
    }

    /// Feeds a frame as is, without restamping its generation.
    pub fn feed_frame(&mut self, frame: Frame) -> FrameOutcome {
        self.clock += Duration::from_secs(1);
        self.pipeline.on_frame(frame, self.clock)
    }

    /// A uniform frame captured now, in the current capture generation.
    pub fn frame(&mut self, width: u32, height: u32, value: u8) -> Frame {
        self.sequence += 1;
        uniform(width, height, value, self.sequence).with_generation(self.device.detector_epoch())
    }

    pub fn siren_playing(&self) -> bool {
        self.siren.lock().unwrap().playing
    }

    pub fn opens(&self) -> usize {
        self.camera.lock().unwrap().opens.len()
    }

    pub fn sink_frames(&self) -> usize {
        self.sink.frames.lock().unwrap().len()
    }

    pub async fn wait_for_audio_blocks(&self, count: u64) {
        for _ in 0..200 {
            if self.sink.audio_blocks.load(Ordering::SeqCst) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("sink received no microphone audio");
    }

    pub async fn wait_for_sink_frames(&self, count: usize) {
        for _ in 0..200 {
            if self.sink_frames() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("sink received {} frames, expected {}", self.sink_frames(), count);
    }
}

pub fn uniform(width: u32, height: u32, value: u8, sequence: u64) -> Frame {
    let data = vec![value; Frame::expected_len(width, height, PixelFormat::Rgb8)];
    Frame::new(width, height, PixelFormat::Rgb8, data, sequence, Utc::now()).unwrap()
}
