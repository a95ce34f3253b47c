//! Per-direction audio stream wiring (subset of component C6, SPEC_FULL §4.6):
//! capture → encode filter chain → codec → RTP sender on the send side, RTP receiver
//! → jitter buffer → codec → decode filter chain → render on the receive side.
//!
//! Each half runs as its own `tokio` task at a fixed packet-time tick (20 ms by
//! default), matching the "driver/bridge threads are dedicated tasks" expression of
//! the concurrency model in SPEC_FULL §5. `core/call` owns construction (it resolves
//! the negotiated codec and opens the device/RTP handles) and spawns `run()`.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use device::{AudioFrame, AudioSink, AudioSource, DeviceError, SampleFormat};
use filter::auconv::SampleFormatConverter;
use filter::auresamp::Resampler;
use filter::dtmf::{DtmfDecoder, DtmfEncoder};
use filter::gain::{Gain, GainControl};
use filter::plc::Plc;
use filter::vad::Vad;
use filter::{Filter, FilterChain, FilterError, FilterEvent};
use rtc::rtp_session::SendRtpPacket;
use sip_ua::{RtpReceiver, RtpSender};
use thiserror::Error;
use tokio::sync::mpsc;

/// Packet time used when a codec/account doesn't pin a different one (SPEC_FULL §5).
pub const DEFAULT_PTIME: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum AudioStreamError {
    #[error("capture/render device error: {0}")]
    Device(#[from] DeviceError),
    #[error("RTP sender is shut down")]
    SenderClosed,
}

/// Observed once the encode/decode filter chain's events are surfaced to the caller;
/// `core/call` turns these into `VuTx`/`VuRx`/`DtmfPressed`/`DtmfReleased` event-bus
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStreamEvent {
    Filter(FilterEvent),
}

/// Input level in dBov, floored at -100.0 for silence (SPEC_FULL §4.6 "meter: input/
/// output level").
pub fn dbov(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return -100.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    if rms < 1.0 {
        return -100.0;
    }
    (20.0 * (rms / 32768.0).log10()) as f32
}

/// Atomic packet/byte/level counters for one stream direction (SPEC_FULL §5 "stream
/// metrics are updated with atomic counters; readers may observe slightly stale
/// values").
#[derive(Default)]
pub struct AudioMetrics {
    packets: AtomicU64,
    bytes: AtomicU64,
    level_dbov_milli: AtomicI32,
}

impl AudioMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, byte_len: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(byte_len as u64, Ordering::Relaxed);
    }

    fn record_level(&self, level_dbov: f32) {
        self.level_dbov_milli
            .store((level_dbov * 1000.0) as i32, Ordering::Relaxed);
    }

    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn level_dbov(&self) -> f32 {
        self.level_dbov_milli.load(Ordering::Relaxed) as f32 / 1000.0
    }
}

/// Shared handle to queue outbound in-band DTMF digits (SPEC_FULL §4.4 "send digits"
/// command), since the encode filter chain owns the actual `DtmfEncoder` instance.
#[derive(Clone)]
pub struct DtmfQueue(Arc<Mutex<DtmfEncoder>>);

impl DtmfQueue {
    pub fn new(tone_ms: u32, gap_ms: u32) -> Self {
        Self(Arc::new(Mutex::new(DtmfEncoder::new(tone_ms, gap_ms))))
    }

    pub fn send(&self, digits: &str) -> Result<(), FilterError> {
        self.0.lock().unwrap().send(digits)
    }
}

struct DtmfPlayback(DtmfQueue);

impl Filter for DtmfPlayback {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        self.0 .0.lock().unwrap().process(frame)
    }
}

/// Device/codec rate, channel count and format on each side of a filter chain, used to
/// decide which symmetric filters (auconv, auresamp) are actually needed.
#[derive(Debug, Clone, Copy)]
pub struct ChainParams {
    pub device_rate: u32,
    pub device_channels: u8,
    pub device_format: SampleFormat,
    pub codec_rate: u32,
    pub codec_channels: u8,
}

/// Builds the send-side (encode) filter chain in declaration order: resample, convert
/// to S16LE, gain, DTMF playback (SPEC_FULL §4.4).
pub fn build_encode_chain(params: &ChainParams) -> (FilterChain, GainControl, DtmfQueue) {
    let mut chain = FilterChain::new();

    if Resampler::is_needed(
        params.device_rate,
        params.device_channels,
        params.codec_rate,
        params.codec_channels,
    ) {
        chain.push(Box::new(Resampler::new(params.codec_rate, params.codec_channels)));
    }
    if params.device_format != SampleFormat::S16Le {
        chain.push(Box::new(SampleFormatConverter::new(SampleFormat::S16Le)));
    }

    let gain = GainControl::new(1.0);
    chain.push(Box::new(Gain::new(gain.clone())));

    let dtmf = DtmfQueue::new(100, 100);
    chain.push(Box::new(DtmfPlayback(dtmf.clone())));

    (chain, gain, dtmf)
}

/// Builds the receive-side (decode) filter chain: gain, convert/resample back to
/// device format (reversed relative to the encode chain's symmetric filters per
/// SPEC_FULL §4.4), then the decode-only PLC/DTMF-detect/VAD filters in declaration
/// order.
pub fn build_decode_chain(params: &ChainParams) -> (FilterChain, GainControl) {
    let mut chain = FilterChain::new();

    let gain = GainControl::new(1.0);
    chain.push(Box::new(Gain::new(gain.clone())));

    if params.device_format != SampleFormat::S16Le {
        chain.push(Box::new(SampleFormatConverter::new(params.device_format)));
    }
    if Resampler::is_needed(
        params.codec_rate,
        params.codec_channels,
        params.device_rate,
        params.device_channels,
    ) {
        chain.push(Box::new(Resampler::new(params.device_rate, params.device_channels)));
    }

    chain.push(Box::new(Plc::new()));
    chain.push(Box::new(DtmfDecoder::new()));
    chain.push(Box::new(Vad::new()));

    (chain, gain)
}

/// Owns the capture→encode→RTP half of one audio stream.
pub struct AudioSendStream {
    source: Box<dyn AudioSource>,
    chain: FilterChain,
    codec: Box<dyn codec::AudioCodec>,
    pt: u8,
    sender: RtpSender,
    metrics: Arc<AudioMetrics>,
}

impl AudioSendStream {
    pub fn new(
        source: Box<dyn AudioSource>,
        chain: FilterChain,
        codec: Box<dyn codec::AudioCodec>,
        pt: u8,
        sender: RtpSender,
    ) -> (Self, Arc<AudioMetrics>) {
        let metrics = Arc::new(AudioMetrics::new());
        (
            Self {
                source,
                chain,
                codec,
                pt,
                sender,
                metrics: metrics.clone(),
            },
            metrics,
        )
    }

    /// Runs until the capture device errors fatally or the RTP sender shuts down
    /// (SPEC_FULL §4.6 "capture/render fatal errors surface via the error callback").
    pub async fn run(mut self) -> Result<(), AudioStreamError> {
        loop {
            let mut frame = self.source.read().await?;

            if let Err(e) = self.chain.process(&mut frame) {
                log::warn!("audio encode chain error: {e}");
                continue;
            }

            let samples = frame.as_s16le();
            let encoded = match self.codec.encode_frame(&samples) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("audio encode error: {e}");
                    continue;
                }
            };

            self.metrics.record_level(dbov(&samples));
            self.metrics.record(encoded.len());

            let packet = SendRtpPacket::new(Instant::now(), self.pt, Bytes::from(encoded));
            self.sender
                .send(packet)
                .await
                .map_err(|_| AudioStreamError::SenderClosed)?;
        }
    }
}

/// Owns the RTP→jitter→decode→render half of one audio stream.
pub struct AudioRecvStream {
    receiver: RtpReceiver,
    jitter: Arc<jitter::JitterBuffer>,
    codec: Box<dyn codec::AudioCodec>,
    chain: FilterChain,
    sink: Box<dyn AudioSink>,
    frame_bytes: usize,
    sample_rate: u32,
    channels: u8,
    ptime: Duration,
    metrics: Arc<AudioMetrics>,
}

impl AudioRecvStream {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        receiver: RtpReceiver,
        jitter: Arc<jitter::JitterBuffer>,
        codec: Box<dyn codec::AudioCodec>,
        chain: FilterChain,
        sink: Box<dyn AudioSink>,
        frame_bytes: usize,
        sample_rate: u32,
        channels: u8,
        ptime: Duration,
    ) -> (Self, Arc<AudioMetrics>) {
        let metrics = Arc::new(AudioMetrics::new());
        (
            Self {
                receiver,
                jitter,
                codec,
                chain,
                sink,
                frame_bytes,
                sample_rate,
                channels,
                ptime,
                metrics: metrics.clone(),
            },
            metrics,
        )
    }

    /// Runs until the render device errors fatally. Spawns a helper task that pulls
    /// encoded RTP payloads into the jitter buffer while this task drains it on a
    /// fixed tick, per SPEC_FULL §4.6's split "pull from RTP" / "drive the codec"
    /// responsibilities.
    pub async fn run(
        mut self,
        events: mpsc::Sender<AudioStreamEvent>,
    ) -> Result<(), AudioStreamError> {
        let jitter = self.jitter.clone();
        let metrics = self.metrics.clone();
        let mut rtp_rx = self.receiver.into_inner();
        let pull = tokio::spawn(async move {
            while let Some(packet) = rtp_rx.recv().await {
                metrics.record(packet.payload.len());
                jitter.append(&packet.payload);
            }
        });

        let mut tick = tokio::time::interval(self.ptime);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let result = loop {
            tick.tick().await;

            let underflow_before = self.jitter.underflow_count();
            let encoded = self.jitter.read_exact(self.frame_bytes);
            let lost = self.jitter.underflow_count() != underflow_before;

            let samples = if lost {
                Vec::new()
            } else {
                match self.codec.decode_frame(&encoded) {
                    Ok(samples) => {
                        self.metrics.record_level(dbov(&samples));
                        samples
                    }
                    Err(e) => {
                        log::warn!("audio decode error: {e}");
                        continue;
                    }
                }
            };

            let mut frame = AudioFrame::from_s16le(&samples, self.sample_rate, self.channels, 0);
            if lost {
                frame.sample_count = 0;
            }

            match self.chain.process(&mut frame) {
                Ok(filter_events) => {
                    for event in filter_events {
                        if events.send(AudioStreamEvent::Filter(event)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => log::warn!("audio decode chain error: {e}"),
            }

            if let Err(e) = self.sink.write(frame).await {
                break Err(AudioStreamError::Device(e));
            }
        };

        pull.abort();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device::AudioParams;

    #[test]
    fn dbov_of_silence_is_floored() {
        assert_eq!(dbov(&[]), -100.0);
        assert_eq!(dbov(&[0; 160]), -100.0);
    }

    #[test]
    fn dbov_of_full_scale_is_near_zero() {
        let samples = vec![i16::MAX; 160];
        let level = dbov(&samples);
        assert!(level > -1.0 && level <= 0.0, "level was {level}");
    }

    #[test]
    fn metrics_round_trip() {
        let metrics = AudioMetrics::new();
        metrics.record(160);
        metrics.record(160);
        metrics.record_level(-12.5);
        assert_eq!(metrics.packets(), 2);
        assert_eq!(metrics.bytes(), 320);
        assert!((metrics.level_dbov() - (-12.5)).abs() < 0.01);
    }

    #[test]
    fn dtmf_queue_rejects_non_dtmf_characters() {
        let queue = DtmfQueue::new(100, 100);
        assert!(queue.send("123").is_ok());
        assert!(queue.send("xyz").is_err());
    }

    #[test]
    fn encode_chain_applies_gain_when_device_already_matches_codec() {
        let params = ChainParams {
            device_rate: 8000,
            device_channels: 1,
            device_format: SampleFormat::S16Le,
            codec_rate: 8000,
            codec_channels: 1,
        };
        let (mut chain, gain, _dtmf) = build_encode_chain(&params);
        gain.set(2.0);

        let mut frame = AudioFrame::from_s16le(&[100, -100, 200], 8000, 1, 0);
        chain.process(&mut frame).unwrap();
        assert_eq!(frame.as_s16le(), vec![200, -200, 400]);
    }

    #[test]
    fn decode_chain_resamples_when_device_rate_differs_from_codec() {
        let params = ChainParams {
            device_rate: 16000,
            device_channels: 1,
            device_format: SampleFormat::S16Le,
            codec_rate: 8000,
            codec_channels: 1,
        };
        let (mut chain, _gain) = build_decode_chain(&params);

        let mut frame = AudioFrame::from_s16le(&[0; 160], 8000, 1, 0);
        chain.process(&mut frame).unwrap();
        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.as_s16le().len(), 320);
    }

    #[test]
    fn lost_frame_is_marked_empty_before_entering_the_decode_chain() {
        let params = ChainParams {
            device_rate: 8000,
            device_channels: 1,
            device_format: SampleFormat::S16Le,
            codec_rate: 8000,
            codec_channels: 1,
        };
        let (mut chain, _gain) = build_decode_chain(&params);

        let mut good = AudioFrame::from_s16le(&[10, 20, 30], 8000, 1, 0);
        chain.process(&mut good).unwrap();

        let mut lost = AudioFrame::from_s16le(&[], 8000, 1, 0);
        lost.sample_count = 0;
        chain.process(&mut lost).unwrap();
        assert_eq!(lost.sample_count, 3);
    }

    #[test]
    fn audio_params_samples_per_frame_matches_default_ptime() {
        let params = AudioParams {
            sample_rate: 8000,
            channels: 1,
            format: SampleFormat::S16Le,
            ptime: DEFAULT_PTIME,
        };
        assert_eq!(params.samples_per_frame(), 160);
    }
}
