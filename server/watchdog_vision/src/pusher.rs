use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, error, info, trace, warn};

use crate::audio::{AUDIO_BLOCK_SAMPLES, AudioSource, SinkAudio};
use crate::convert::prepare_for_stream;
use crate::error::StreamError;
use crate::frame::{Frame, PixelFormat};
use crate::sink::{MediaSink, SinkFrame, StreamSettings};

/// Frames and audio blocks waiting for the sink thread, further items are dropped.
const SINK_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PusherState {
    Idle = 0,
    Starting = 1,
    Active = 2,
    Stopping = 3,
}

impl PusherState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PusherState::Starting,
            2 => PusherState::Active,
            3 => PusherState::Stopping,
            _ => PusherState::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    pushed: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    audio_blocks: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        for counter in [&self.pushed, &self.dropped, &self.failed, &self.audio_blocks] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Per-session frame counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushStats {
    pub pushed: u64,
    /// Frames skipped because the sink thread was busy.
    pub dropped: u64,
    /// Frames or audio blocks the sink failed to send.
    pub failed: u64,
    /// Microphone blocks the sink accepted.
    pub audio_blocks: u64,
}

enum SinkItem {
    Video(SinkFrame),
    Audio(SinkAudio),
}

/// Forwards captured frames to a [`MediaSink`] while a session is active.
///
/// `push` never blocks, conversion happens on the caller's thread and encoding on a
/// dedicated sink thread. Frames are dropped whenever the sink falls behind. With an
/// [`AudioSource`] attached, each session also records microphone blocks on its own thread.
pub struct StreamPusher {
    state: AtomicU8,
    inner: Mutex<Inner>,
    counters: Arc<Counters>,
}

struct Inner {
    settings: Option<StreamSettings>,
    /// Present while no session is running.
    sink: Option<Box<dyn MediaSink>>,
    /// Present while no session is recording.
    audio: Option<Box<dyn AudioSource>>,
    session: Option<Session>,
}

struct Session {
    tx: SyncSender<SinkItem>,
    handle: JoinHandle<Box<dyn MediaSink>>,
    audio: Option<AudioTask>,
    started_at: Instant,
    scale: u32,
    format: PixelFormat,
    failed: Arc<AtomicBool>,
}

struct AudioTask {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn AudioSource>>,
}

impl StreamPusher {
    pub fn new(sink: Box<dyn MediaSink>) -> Self {
        Self {
            state: AtomicU8::new(PusherState::Idle as u8),
            inner: Mutex::new(Inner {
                settings: None,
                sink: Some(sink),
                audio: None,
                session: None,
            }),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Records from `source` alongside the video of every session.
    pub fn with_audio(mut self, source: Box<dyn AudioSource>) -> Self {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .audio = Some(source);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: PusherState) {
        self.state
            .store(state as u8, Ordering::Release);
    }

    pub fn state(&self) -> PusherState {
        PusherState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == PusherState::Active
    }

    /// Stores the settings used by the next `start`.
    pub fn configure(&self, settings: StreamSettings) {
        debug!(
            "Stream configured. url: {}, size: {}x{}, fps: {}, scale: {}",
            settings.url, settings.width, settings.height, settings.frame_rate, settings.scale
        );
        self.lock().settings = Some(settings);
    }

    /// Connects the sink and begins accepting frames, a no-op while already running.
    pub fn start(&self) -> Result<(), StreamError> {
        if self
            .state
            .compare_exchange(
                PusherState::Idle as u8,
                PusherState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!("Stream already started. state: {:?}", self.state());
            return Ok(());
        }

        let result = self.open_session();
        match &result {
            Ok(()) => {
                self.set_state(PusherState::Active);
                info!("Streaming started");
            }
            Err(e) => {
                self.set_state(PusherState::Idle);
                warn!("Unable to start streaming: {}", e);
            }
        }
        result
    }

    fn open_session(&self) -> Result<(), StreamError> {
        let mut inner = self.lock();
        let settings = inner
            .settings
            .clone()
            .ok_or(StreamError::NotConfigured)?;
        let mut sink = inner
            .sink
            .take()
            .ok_or(StreamError::SinkUnavailable)?;

        let started = sink
            .configure(&settings)
            .and_then(|()| sink.start());
        if let Err(e) = started {
            inner.sink = Some(sink);
            return Err(e);
        }

        let format = sink.input_format();
        let failed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::sync_channel::<SinkItem>(SINK_QUEUE_DEPTH);

        self.counters.reset();

        let handle = thread::Builder::new()
            .name("stream/sink".to_string())
            .spawn({
                let counters = self.counters.clone();
                let failed = failed.clone();
                move || {
                    for item in rx {
                        if failed.load(Ordering::Relaxed) {
                            if let SinkItem::Video(_) = item {
                                counters
                                    .dropped
                                    .fetch_add(1, Ordering::Relaxed);
                            }
                            continue;
                        }
                        let sent = match &item {
                            SinkItem::Video(frame) => sink.push(frame),
                            SinkItem::Audio(audio) => sink.push_audio(audio),
                        };
                        if sent {
                            let counter = match item {
                                SinkItem::Video(_) => &counters.pushed,
                                SinkItem::Audio(_) => &counters.audio_blocks,
                            };
                            counter.fetch_add(1, Ordering::Release);
                        } else {
                            failed.store(true, Ordering::Relaxed);
                            counters
                                .failed
                                .fetch_add(1, Ordering::Release);
                            warn!("Media sink push failed, dropping frames until streaming is restarted");
                        }
                    }
                    sink.stop();
                    sink
                }
            })
            .map_err(|e| {
                error!("Unable to spawn stream sink thread: {}", e);
                StreamError::SinkUnavailable
            })?;

        let started_at = Instant::now();
        let audio = match inner.audio.take() {
            Some(source) => spawn_audio(source, settings.audio_sample_rate, started_at, tx.clone()),
            None => None,
        };

        inner.session = Some(Session {
            tx,
            handle,
            audio,
            started_at,
            scale: settings.scale,
            format,
            failed,
        });
        Ok(())
    }

    /// Converts and queues a frame, silently dropped unless streaming is active.
    pub fn push(&self, frame: Frame) {
        if !self.is_active() {
            return;
        }

        let (tx, started_at, scale, format) = {
            let inner = self.lock();
            let Some(session) = &inner.session else {
                return;
            };
            if session.failed.load(Ordering::Relaxed) {
                self.counters
                    .dropped
                    .fetch_add(1, Ordering::Relaxed);
                return;
            }
            (session.tx.clone(), session.started_at, session.scale, session.format)
        };

        let convert_start = Instant::now();
        let converted = match prepare_for_stream(&frame, scale, format) {
            Ok(converted) => converted,
            Err(e) => {
                warn!("Unable to convert frame for streaming. sequence: {}, error: {}", frame.sequence(), e);
                return;
            }
        };
        let sink_frame = SinkFrame {
            frame: converted,
            timestamp_us: started_at.elapsed().as_micros() as u64,
        };

        match tx.try_send(SinkItem::Video(sink_frame)) {
            Ok(()) => {
                trace!(
                    "Frame queued for streaming. sequence: {}, convert_duration: {}us",
                    frame.sequence(),
                    convert_start.elapsed().as_micros()
                );
            }
            Err(_) => {
                self.counters
                    .dropped
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Flushes and disconnects the sink, safe to call in any state.
    pub fn stop(&self) {
        let state = self.state();
        if state == PusherState::Idle || state == PusherState::Stopping {
            return;
        }
        self.set_state(PusherState::Stopping);

        let mut inner = self.lock();
        if let Some(session) = inner.session.take() {
            let Session {
                tx,
                handle,
                audio,
                ..
            } = session;
            // the audio thread holds a sender too, it has to finish first
            if let Some(audio) = audio {
                audio
                    .stop
                    .store(true, Ordering::Relaxed);
                match audio.handle.join() {
                    Ok(source) => inner.audio = Some(source),
                    Err(_) => error!("Stream audio thread panicked, audio is no longer available"),
                }
            }
            drop(tx);
            match handle.join() {
                Ok(sink) => inner.sink = Some(sink),
                Err(_) => error!("Stream sink thread panicked, sink is no longer available"),
            }
        }
        drop(inner);

        let stats = self.stats();
        info!(
            "Streaming stopped. pushed: {}, dropped: {}, failed: {}, audio_blocks: {}",
            stats.pushed, stats.dropped, stats.failed, stats.audio_blocks
        );
        self.set_state(PusherState::Idle);
    }

    /// Counts for the current or most recent session.
    pub fn stats(&self) -> PushStats {
        PushStats {
            pushed: self
                .counters
                .pushed
                .load(Ordering::Acquire),
            dropped: self
                .counters
                .dropped
                .load(Ordering::Acquire),
            failed: self
                .counters
                .failed
                .load(Ordering::Acquire),
            audio_blocks: self
                .counters
                .audio_blocks
                .load(Ordering::Acquire),
        }
    }
}

fn spawn_audio(
    mut source: Box<dyn AudioSource>,
    sample_rate: u32,
    started_at: Instant,
    tx: SyncSender<SinkItem>,
) -> Option<AudioTask> {
    let stop = Arc::new(AtomicBool::new(false));
    let spawned = thread::Builder::new()
        .name("stream/audio".to_string())
        .spawn({
            let stop = stop.clone();
            move || {
                if let Err(e) = source.start(sample_rate) {
                    warn!("Unable to start audio input, streaming video only: {}", e);
                    return source;
                }
                let mut block = vec![0_i16; AUDIO_BLOCK_SAMPLES];
                while !stop.load(Ordering::Relaxed) {
                    let count = match source.read(&mut block) {
                        Ok(0) => {
                            debug!("Audio input ended");
                            break;
                        }
                        Ok(count) => count,
                        Err(e) => {
                            warn!("Audio input failed, streaming video only: {}", e);
                            break;
                        }
                    };
                    let audio = SinkAudio {
                        samples: block[..count].to_vec(),
                        sample_rate,
                        timestamp_us: started_at.elapsed().as_micros() as u64,
                    };
                    match tx.try_send(SinkItem::Audio(audio)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => trace!("Sink busy, dropping audio block"),
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
                source.stop();
                source
            }
        });

    match spawned {
        Ok(handle) => Some(AudioTask {
            stop,
            handle,
        }),
        Err(e) => {
            error!("Unable to spawn stream audio thread, streaming video only: {}", e);
            None
        }
    }
}

impl Drop for StreamPusher {
    fn drop(&mut self) {
        self.stop();
    }
}
