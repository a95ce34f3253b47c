//! Media device registry and drivers (component C1).
//!
//! No physical audio/video hardware is reachable from this workspace, so the only
//! drivers shipped are synthetic ones (`sine`, `silence`, `null`); they implement the
//! same [`AudioSource`]/[`AudioSink`]/[`VideoSource`]/[`VideoSink`] traits a real driver
//! would, so a hardware backend is a registry entry away, not a redesign.
//!
//! Frame delivery in the original design is callback-based, running on a driver-owned
//! thread. This workspace expresses that as an async `read`/`write` method driven by a
//! dedicated `tokio` task per active driver instance (see `media/audio-pipeline`),
//! which keeps the "interrupt-level, lock-free-only" constraint in SPEC_FULL §4.2 by
//! construction: the driver task never touches call state directly, only the jitter
//! buffer and atomic counters it is handed.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub mod drivers;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no {kind} device named {name:?}")]
    NotFound { kind: &'static str, name: String },
    #[error("fatal device I/O error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16Le,
    Float,
    ALaw,
    ULaw,
}

impl SampleFormat {
    pub fn sample_size(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::Float => 4,
            SampleFormat::ALaw | SampleFormat::ULaw => 1,
        }
    }
}

/// One packet-time's worth of audio. Invariant (SPEC_FULL §3):
/// `data.len() == sample_count * channels as usize * format.sample_size()`.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u8,
    pub sample_count: usize,
    pub capture_timestamp_us: u64,
    pub rtp_timestamp: Option<u32>,
    pub data: Vec<u8>,
}

impl AudioFrame {
    pub fn silence(
        format: SampleFormat,
        sample_rate: u32,
        channels: u8,
        sample_count: usize,
        capture_timestamp_us: u64,
    ) -> Self {
        let len = sample_count * channels as usize * format.sample_size();
        Self {
            format,
            sample_rate,
            channels,
            sample_count,
            capture_timestamp_us,
            rtp_timestamp: None,
            data: vec![0; len],
        }
    }

    pub fn is_size_consistent(&self) -> bool {
        self.data.len() == self.sample_count * self.channels as usize * self.format.sample_size()
    }

    /// View the buffer as S16LE samples. Panics (programmer error) if the format isn't
    /// S16LE or the buffer is malformed; callers run the format-converter filter first.
    pub fn as_s16le(&self) -> Vec<i16> {
        assert_eq!(self.format, SampleFormat::S16Le);
        self.data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    pub fn from_s16le(
        samples: &[i16],
        sample_rate: u32,
        channels: u8,
        capture_timestamp_us: u64,
    ) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            data.extend_from_slice(&s.to_le_bytes());
        }
        Self {
            format: SampleFormat::S16Le,
            sample_rate,
            channels,
            sample_count: samples.len() / channels.max(1) as usize,
            capture_timestamp_us,
            rtp_timestamp: None,
            data,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u8,
    pub format: SampleFormat,
    pub ptime: Duration,
}

impl AudioParams {
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u128 * self.ptime.as_millis() / 1000) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    I420,
    Nv12,
    Rgb24,
}

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub timestamp_us: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
}

pub trait AudioSource: Send {
    fn read(&mut self) -> impl Future<Output = Result<AudioFrame, DeviceError>> + Send;
}

pub trait AudioSink: Send {
    fn write(&mut self, frame: AudioFrame) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

pub trait VideoSource: Send {
    fn read(&mut self) -> impl Future<Output = Result<VideoFrame, DeviceError>> + Send;
}

pub trait VideoSink: Send {
    fn write(&mut self, frame: VideoFrame) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

type AudioSourceFactory = fn(AudioParams) -> Box<dyn AudioSource>;
type AudioSinkFactory = fn(AudioParams) -> Box<dyn AudioSink>;
type VideoSourceFactory = fn(VideoParams) -> Box<dyn VideoSource>;
type VideoSinkFactory = fn(VideoParams) -> Box<dyn VideoSink>;

/// Named lookup of capture/render drivers, populated once at startup and read freely
/// thereafter (SPEC_FULL §5 "Registries ... initialised once ... read freely").
#[derive(Default, Clone)]
pub struct DeviceRegistry {
    audio_sources: HashMap<String, AudioSourceFactory>,
    audio_sinks: HashMap<String, AudioSinkFactory>,
    video_sources: HashMap<String, VideoSourceFactory>,
    video_sinks: HashMap<String, VideoSinkFactory>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the synthetic drivers this workspace ships unconditionally.
    pub fn with_builtin_drivers() -> Self {
        let mut reg = Self::new();
        reg.register_audio_source("sine", drivers::sine_source);
        reg.register_audio_source("silence", drivers::silence_source);
        reg.register_audio_sink("silence", drivers::silence_sink);
        reg.register_video_source("null", drivers::null_video_source);
        reg.register_video_sink("null", drivers::null_video_sink);
        reg
    }

    pub fn register_audio_source(&mut self, name: &str, factory: AudioSourceFactory) {
        self.audio_sources.insert(name.to_owned(), factory);
    }

    pub fn register_audio_sink(&mut self, name: &str, factory: AudioSinkFactory) {
        self.audio_sinks.insert(name.to_owned(), factory);
    }

    pub fn register_video_source(&mut self, name: &str, factory: VideoSourceFactory) {
        self.video_sources.insert(name.to_owned(), factory);
    }

    pub fn register_video_sink(&mut self, name: &str, factory: VideoSinkFactory) {
        self.video_sinks.insert(name.to_owned(), factory);
    }

    pub fn open_audio_source(
        &self,
        name: &str,
        params: AudioParams,
    ) -> Result<Box<dyn AudioSource>, DeviceError> {
        let factory = self
            .audio_sources
            .get(name)
            .ok_or_else(|| DeviceError::NotFound {
                kind: "audio-source",
                name: name.to_owned(),
            })?;
        Ok(factory(params))
    }

    pub fn open_audio_sink(
        &self,
        name: &str,
        params: AudioParams,
    ) -> Result<Box<dyn AudioSink>, DeviceError> {
        let factory = self
            .audio_sinks
            .get(name)
            .ok_or_else(|| DeviceError::NotFound {
                kind: "audio-sink",
                name: name.to_owned(),
            })?;
        Ok(factory(params))
    }

    pub fn open_video_source(
        &self,
        name: &str,
        params: VideoParams,
    ) -> Result<Box<dyn VideoSource>, DeviceError> {
        let factory = self
            .video_sources
            .get(name)
            .ok_or_else(|| DeviceError::NotFound {
                kind: "video-source",
                name: name.to_owned(),
            })?;
        Ok(factory(params))
    }

    pub fn open_video_sink(
        &self,
        name: &str,
        params: VideoParams,
    ) -> Result<Box<dyn VideoSink>, DeviceError> {
        let factory = self
            .video_sinks
            .get(name)
            .ok_or_else(|| DeviceError::NotFound {
                kind: "video-sink",
                name: name.to_owned(),
            })?;
        Ok(factory(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_frame_silence_is_size_consistent() {
        let frame = AudioFrame::silence(SampleFormat::S16Le, 8000, 1, 160, 0);
        assert!(frame.is_size_consistent());
        assert_eq!(frame.data.len(), 320);
    }

    #[test]
    fn registry_reports_not_found_for_unknown_driver() {
        let reg = DeviceRegistry::new();
        let params = AudioParams {
            sample_rate: 8000,
            channels: 1,
            format: SampleFormat::S16Le,
            ptime: Duration::from_millis(20),
        };
        let err = reg.open_audio_source("does-not-exist", params).unwrap_err();
        assert!(matches!(err, DeviceError::NotFound { .. }));
    }

    #[test]
    fn builtin_registry_has_sine_and_silence() {
        let reg = DeviceRegistry::with_builtin_drivers();
        let params = AudioParams {
            sample_rate: 8000,
            channels: 1,
            format: SampleFormat::S16Le,
            ptime: Duration::from_millis(20),
        };
        assert!(reg.open_audio_source("sine", params).is_ok());
        assert!(reg.open_audio_sink("silence", params).is_ok());
    }
}
