use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use log::{info, trace, warn};

use crate::audio::SinkAudio;
use crate::error::StreamError;
use crate::frame::PixelFormat;
use crate::sink::{MediaSink, SinkFrame, StreamSettings};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
// kind (1) + timestamp (8) + width (2) + height (2)
const FRAME_HEADER_SIZE: usize = 13;

pub const PACKET_VIDEO: u8 = 1;
pub const PACKET_AUDIO: u8 = 2;

/// Streams JPEG frames and raw audio over a plain TCP connection.
///
/// Every packet is `[u32 length][u8 kind][u64 timestamp_us][body]`, all big-endian, where
/// `length` counts everything after itself. A video body is `[u16 width][u16 height][jpeg]`,
/// an audio body is `[u32 sample_rate][i16 samples]`.
pub struct TcpMediaSink {
    jpeg_quality: u8,
    settings: Option<StreamSettings>,
    address: Option<String>,
    stream: Option<TcpStream>,
    buffer: Vec<u8>,
}

impl TcpMediaSink {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality,
            settings: None,
            address: None,
            stream: None,
            buffer: Vec::new(),
        }
    }

    fn begin_packet(&mut self, kind: u8, timestamp_us: u64) {
        self.buffer.clear();
        // length placeholder, patched by finish_packet
        self.buffer.extend_from_slice(&[0; 4]);
        self.buffer.push(kind);
        self.buffer
            .extend_from_slice(&timestamp_us.to_be_bytes());
    }

    fn finish_packet(&mut self) -> Result<(), StreamError> {
        let length = u32::try_from(self.buffer.len() - 4).map_err(|e| StreamError::Encode(e.to_string()))?;
        self.buffer[..4].copy_from_slice(&length.to_be_bytes());
        Ok(())
    }

    fn encode(&mut self, frame: &SinkFrame) -> Result<(), StreamError> {
        let color_type = match frame.frame.format() {
            PixelFormat::Gray8 => ExtendedColorType::L8,
            PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
        };
        let width = u16::try_from(frame.frame.width()).map_err(|e| StreamError::Encode(e.to_string()))?;
        let height = u16::try_from(frame.frame.height()).map_err(|e| StreamError::Encode(e.to_string()))?;

        self.begin_packet(PACKET_VIDEO, frame.timestamp_us);
        self.buffer
            .extend_from_slice(&width.to_be_bytes());
        self.buffer
            .extend_from_slice(&height.to_be_bytes());

        JpegEncoder::new_with_quality(&mut self.buffer, self.jpeg_quality)
            .encode(frame.frame.data(), frame.frame.width(), frame.frame.height(), color_type)
            .map_err(|e| StreamError::Encode(e.to_string()))?;

        self.finish_packet()
    }

    fn encode_audio(&mut self, audio: &SinkAudio) -> Result<(), StreamError> {
        self.begin_packet(PACKET_AUDIO, audio.timestamp_us);
        self.buffer
            .extend_from_slice(&audio.sample_rate.to_be_bytes());
        for sample in &audio.samples {
            self.buffer
                .extend_from_slice(&sample.to_be_bytes());
        }
        self.finish_packet()
    }

    fn send(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        match stream.write_all(&self.buffer) {
            Ok(()) => true,
            Err(e) => {
                warn!("Media sink write failed, disconnecting. error: {}", e);
                self.stream = None;
                false
            }
        }
    }
}

/// Extracts `host:port` from a `tcp://host:port[/path]` url.
pub fn parse_tcp_url(url: &str) -> Result<String, StreamError> {
    let invalid = || StreamError::InvalidUrl(url.to_string());

    let rest = url
        .strip_prefix("tcp://")
        .ok_or_else(invalid)?;
    let authority = rest
        .split('/')
        .next()
        .unwrap_or_default();
    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(authority.to_string())
}

fn resolve(address: &str) -> std::io::Result<SocketAddr> {
    address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"))
}

impl MediaSink for TcpMediaSink {
    fn configure(&mut self, settings: &StreamSettings) -> Result<(), StreamError> {
        let address = parse_tcp_url(&settings.url)?;
        self.address = Some(address);
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        let (Some(address), Some(settings)) = (&self.address, &self.settings) else {
            return Err(StreamError::NotConfigured);
        };

        let connect_error = |source| StreamError::Connect {
            url: settings.url.clone(),
            source,
        };
        let socket_address = resolve(address).map_err(connect_error)?;
        let stream = TcpStream::connect_timeout(&socket_address, CONNECT_TIMEOUT).map_err(connect_error)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

        info!(
            "Media sink connected. url: {}, size: {}x{}, fps: {}, audio: {}Hz",
            settings.url, settings.width, settings.height, settings.frame_rate, settings.audio_sample_rate
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn push(&mut self, frame: &SinkFrame) -> bool {
        if self.stream.is_none() {
            return false;
        }

        if let Err(e) = self.encode(frame) {
            warn!("Unable to encode frame. sequence: {}, error: {}", frame.frame.sequence(), e);
            return false;
        }

        if !self.send() {
            return false;
        }
        trace!(
            "Frame sent. sequence: {}, bytes: {}, timestamp_us: {}",
            frame.frame.sequence(),
            self.buffer.len() - 4 - FRAME_HEADER_SIZE,
            frame.timestamp_us
        );
        true
    }

    fn push_audio(&mut self, audio: &SinkAudio) -> bool {
        if self.stream.is_none() {
            return false;
        }
        if let Err(e) = self.encode_audio(audio) {
            warn!("Unable to encode audio. samples: {}, error: {}", audio.samples.len(), e);
            return false;
        }
        self.send()
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            info!("Media sink disconnected");
        }
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}
