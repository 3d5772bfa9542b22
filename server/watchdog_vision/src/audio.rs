use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use log::info;

/// Samples handed to the sink per read, about 23 ms at 44.1 kHz.
pub const AUDIO_BLOCK_SAMPLES: usize = 1024;

/// A block of mono 16-bit samples ready for the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Microseconds since the session started.
    pub timestamp_us: u64,
}

/// The microphone side of a stream session.
///
/// Runs on the pusher's audio thread, so `start` and `read` may block.
pub trait AudioSource: Send {
    fn start(&mut self, sample_rate: u32) -> io::Result<()>;

    /// Fills `samples` with the next block, waiting until it is available.
    ///
    /// Returns how many samples were written, `0` once the source has ended.
    fn read(&mut self, samples: &mut [i16]) -> io::Result<usize>;

    fn stop(&mut self);
}

/// Produces silence in real time.
#[derive(Debug, Default)]
pub struct SyntheticMicrophone {
    sample_rate: u32,
    next_block_at: Option<Instant>,
}

impl AudioSource for SyntheticMicrophone {
    fn start(&mut self, sample_rate: u32) -> io::Result<()> {
        if sample_rate == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "zero sample rate"));
        }
        self.sample_rate = sample_rate;
        self.next_block_at = Some(Instant::now());
        Ok(())
    }

    fn read(&mut self, samples: &mut [i16]) -> io::Result<usize> {
        let Some(due) = self.next_block_at else {
            return Ok(0);
        };
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        let block = Duration::from_secs_f64(samples.len() as f64 / f64::from(self.sample_rate));
        self.next_block_at = Some(due + block);

        samples.fill(0);
        Ok(samples.len())
    }

    fn stop(&mut self) {
        self.next_block_at = None;
    }
}

/// Reads raw S16LE mono samples from a file or FIFO.
///
/// The writer is expected to produce samples at the stream's rate, nothing is resampled.
pub struct PcmFileSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    bytes: Vec<u8>,
}

impl PcmFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            bytes: Vec::new(),
        }
    }
}

impl AudioSource for PcmFileSource {
    fn start(&mut self, sample_rate: u32) -> io::Result<()> {
        // blocks on a FIFO until a writer attaches
        let file = File::open(&self.path)?;
        info!("Audio input opened. path: {}, rate: {}Hz", self.path.display(), sample_rate);
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    fn read(&mut self, samples: &mut [i16]) -> io::Result<usize> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };

        self.bytes.resize(samples.len() * 2, 0);
        let mut filled = 0;
        while filled < self.bytes.len() {
            match reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        let count = filled / 2;
        for (sample, pair) in samples
            .iter_mut()
            .zip(self.bytes[..count * 2].chunks_exact(2))
        {
            *sample = i16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(count)
    }

    fn stop(&mut self) {
        self.reader = None;
    }
}
