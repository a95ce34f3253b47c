//! Synthetic device drivers: the only ones this workspace can run without real
//! hardware. Each paces itself to the configured packet time with `tokio::time::sleep`,
//! matching the "real-time cadence" requirement in SPEC_FULL §4.2.

use std::f32::consts::PI;
use std::time::Instant;

use tokio::time::{sleep_until, Instant as TokioInstant};

use crate::{
    AudioFrame, AudioParams, AudioSink, AudioSource, DeviceError, PixelFormat, VideoFrame,
    VideoParams, VideoSink, VideoSource,
};

const SINE_FREQ_HZ: f32 = 440.0;
const SINE_AMPLITUDE: f32 = 0.2 * i16::MAX as f32;

struct Sine {
    params: AudioParams,
    phase: f32,
    next_due: TokioInstant,
    start: Instant,
}

impl AudioSource for Sine {
    async fn read(&mut self) -> Result<AudioFrame, DeviceError> {
        sleep_until(self.next_due).await;
        self.next_due += self.params.ptime;

        let count = self.params.samples_per_frame();
        let step = 2.0 * PI * SINE_FREQ_HZ / self.params.sample_rate as f32;
        let mut samples = Vec::with_capacity(count * self.params.channels as usize);
        for _ in 0..count {
            let sample = (self.phase.sin() * SINE_AMPLITUDE) as i16;
            for _ in 0..self.params.channels {
                samples.push(sample);
            }
            self.phase += step;
            if self.phase > 2.0 * PI {
                self.phase -= 2.0 * PI;
            }
        }

        let capture_timestamp_us = self.start.elapsed().as_micros() as u64;
        Ok(AudioFrame::from_s16le(
            &samples,
            self.params.sample_rate,
            self.params.channels,
            capture_timestamp_us,
        ))
    }
}

pub fn sine_source(params: AudioParams) -> Box<dyn AudioSource> {
    Box::new(Sine {
        params,
        phase: 0.0,
        next_due: TokioInstant::now(),
        start: Instant::now(),
    })
}

struct SilenceSource {
    params: AudioParams,
    next_due: TokioInstant,
    start: Instant,
}

impl AudioSource for SilenceSource {
    async fn read(&mut self) -> Result<AudioFrame, DeviceError> {
        sleep_until(self.next_due).await;
        self.next_due += self.params.ptime;
        let capture_timestamp_us = self.start.elapsed().as_micros() as u64;
        Ok(AudioFrame::silence(
            self.params.format,
            self.params.sample_rate,
            self.params.channels,
            self.params.samples_per_frame(),
            capture_timestamp_us,
        ))
    }
}

pub fn silence_source(params: AudioParams) -> Box<dyn AudioSource> {
    Box::new(SilenceSource {
        params,
        next_due: TokioInstant::now(),
        start: Instant::now(),
    })
}

struct SilenceSink;

impl AudioSink for SilenceSink {
    async fn write(&mut self, _frame: AudioFrame) -> Result<(), DeviceError> {
        Ok(())
    }
}

pub fn silence_sink(_params: AudioParams) -> Box<dyn AudioSink> {
    Box::new(SilenceSink)
}

struct NullVideoSource {
    params: VideoParams,
    next_due: TokioInstant,
    period: std::time::Duration,
    start: Instant,
}

impl VideoSource for NullVideoSource {
    async fn read(&mut self) -> Result<VideoFrame, DeviceError> {
        sleep_until(self.next_due).await;
        self.next_due += self.period;
        let frame_size = (self.params.width * self.params.height * 3 / 2) as usize;
        Ok(VideoFrame {
            format: self.params.format,
            width: self.params.width,
            height: self.params.height,
            data: vec![0; frame_size],
            timestamp_us: self.start.elapsed().as_micros() as u64,
        })
    }
}

pub fn null_video_source(params: VideoParams) -> Box<dyn VideoSource> {
    let period = std::time::Duration::from_millis(1000 / params.fps.max(1) as u64);
    Box::new(NullVideoSource {
        params: VideoParams {
            format: PixelFormat::I420,
            ..params
        },
        next_due: TokioInstant::now(),
        period,
        start: Instant::now(),
    })
}

struct NullVideoSink;

impl VideoSink for NullVideoSink {
    async fn write(&mut self, _frame: VideoFrame) -> Result<(), DeviceError> {
        Ok(())
    }
}

pub fn null_video_sink(_params: VideoParams) -> Box<dyn VideoSink> {
    Box::new(NullVideoSink)
}
