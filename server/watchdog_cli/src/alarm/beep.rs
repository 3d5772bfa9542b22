use std::f64::consts::TAU;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use watchdog_common::alarm::AlarmConfig;

use super::Siren;

pub const BLOCK_SAMPLES: usize = 1024;

/// Destination for generated 16-bit mono samples.
pub trait PcmSink: Send {
    fn write(&mut self, samples: &[i16]) -> io::Result<()>;
}

/// Raw little-endian samples appended to a file or FIFO.
///
/// Opened on the first write, so a FIFO without a reader only stalls the tone thread.
pub struct PcmFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl PcmFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                info!("Alarm tone output opened. path: {}", self.path.display());
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }
}

impl PcmSink for PcmFile {
    fn write(&mut self, samples: &[i16]) -> io::Result<()> {
        let result = write_le(self.writer()?, samples);
        if result.is_err() {
            // reopen on the next block, the reader may come back
            self.writer = None;
        }
        result
    }
}

fn write_le(writer: &mut impl Write, samples: &[i16]) -> io::Result<()> {
    for sample in samples {
        writer.write_all(&sample.to_le_bytes())?;
    }
    writer.flush()
}

/// Drops every sample.
pub struct DiscardPcm;

impl PcmSink for DiscardPcm {
    fn write(&mut self, _samples: &[i16]) -> io::Result<()> {
        Ok(())
    }
}

/// Continuous sine tone, phase carries over between blocks.
pub struct ToneGenerator {
    step: f64,
    angle: f64,
}

impl ToneGenerator {
    pub fn new(frequency_hz: u32, sample_rate_hz: u32) -> Self {
        Self {
            step: TAU * f64::from(frequency_hz) / f64::from(sample_rate_hz.max(1)),
            angle: 0.0,
        }
    }

    pub fn fill(&mut self, gain: f32, out: &mut [i16]) {
        let amplitude = f64::from(gain.clamp(0.0, 1.0)) * f64::from(i16::MAX);
        for sample in out.iter_mut() {
            *sample = (self.angle.sin() * amplitude).round() as i16;
            self.angle = (self.angle + self.step) % TAU;
        }
    }
}

#[derive(Debug)]
struct BeepState {
    playing: bool,
    closed: bool,
    gain: f32,
}

type Shared = Arc<(Mutex<BeepState>, Condvar)>;

fn lock(shared: &Shared) -> MutexGuard<'_, BeepState> {
    shared
        .0
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Alarm tone played from a dedicated thread.
pub struct Beep {
    shared: Shared,
    handle: Option<JoinHandle<()>>,
}

impl Beep {
    pub fn new(config: &AlarmConfig) -> io::Result<Self> {
        let sink: Box<dyn PcmSink> = match &config.pcm_output {
            Some(path) => {
                info!("Alarm tone output: {}", path.display());
                Box::new(PcmFile::new(path))
            }
            None => {
                debug!("No alarm tone output configured, samples are discarded");
                Box::new(DiscardPcm)
            }
        };
        Self::with_sink(config, sink)
    }

    pub fn with_sink(config: &AlarmConfig, sink: Box<dyn PcmSink>) -> io::Result<Self> {
        let shared: Shared = Arc::new((
            Mutex::new(BeepState {
                playing: false,
                closed: false,
                gain: config.initial_volume,
            }),
            Condvar::new(),
        ));

        let generator = ToneGenerator::new(config.frequency_hz, config.sample_rate_hz);
        let block_duration = Duration::from_secs_f64(BLOCK_SAMPLES as f64 / f64::from(config.sample_rate_hz.max(1)));

        let handle = thread::Builder::new()
            .name("alarm/beep".to_string())
            .spawn({
                let shared = shared.clone();
                move || tone_loop(shared, generator, sink, block_duration)
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    fn update(&self, f: impl FnOnce(&mut BeepState)) {
        let mut state = lock(&self.shared);
        f(&mut state);
        self.shared.1.notify_all();
    }
}

fn tone_loop(shared: Shared, mut generator: ToneGenerator, mut sink: Box<dyn PcmSink>, block_duration: Duration) {
    let mut block = [0_i16; BLOCK_SAMPLES];
    let mut write_failed = false;
    let mut next_block_at = Instant::now();

    loop {
        let gain = {
            let mut state = lock(&shared);
            while !state.playing && !state.closed {
                state = shared
                    .1
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                next_block_at = Instant::now();
            }
            if state.closed {
                break;
            }
            state.gain
        };

        generator.fill(gain, &mut block);
        match sink.write(&block) {
            Ok(()) => write_failed = false,
            Err(e) => {
                if !write_failed {
                    warn!("Alarm tone write failed: {}", e);
                }
                write_failed = true;
            }
        }

        next_block_at += block_duration;
        let now = Instant::now();
        if next_block_at > now {
            thread::sleep(next_block_at - now);
        } else {
            next_block_at = now;
        }
    }
    debug!("Alarm tone thread stopped");
}

impl Siren for Beep {
    fn play(&mut self) {
        self.update(|state| state.playing = true);
    }

    fn pause(&mut self) {
        self.update(|state| state.playing = false);
    }

    fn out_loud(&mut self) {
        self.update(|state| state.gain = 1.0);
    }

    fn close(&mut self) {
        self.update(|state| {
            state.playing = false;
            state.closed = true;
        });
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Alarm tone thread panicked");
            }
        }
    }
}

impl Drop for Beep {
    fn drop(&mut self) {
        self.close();
    }
}
