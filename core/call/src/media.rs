//! [`CallMediaBackend`]: the [`sip_ua::MediaBackend`] implementation `Call` drives.
//!
//! Wraps `sip_ua`'s [`RtcMediaBackend`] for SDP offer/answer and RTP transport (ICE/
//! STUN gathering, DTLS-SRTP, transport bundling all live there), and on every
//! `SenderAdded`/`ReceiverAdded` it reports, spawns the codec/device/filter pipeline
//! from `audio-pipeline` on top of the handed-over `RtpSender`/`RtpReceiver` -- this is
//! the seam between transport and the capture/encode/decode/render chain.
//!
//! Video is carried by `video-pipeline` using the same `RtpSender`/`RtpReceiver`
//! shape, but is not yet wired into SDP offer construction here: there's no real RTP
//! video payload format to ground against (see `video-pipeline`'s own note on its
//! in-payload fragment header), so a second negotiated `m=video` line needs a
//! placeholder codec entry this crate doesn't invent. Video device/codec plumbing
//! exists and is ready to be registered here the same way once a payload format is
//! picked (see DESIGN.md).

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use audio_pipeline::{
    AudioMetrics, AudioRecvStream, AudioSendStream, AudioStreamError, AudioStreamEvent,
    ChainParams, build_decode_chain, build_encode_chain,
};
use device::{AudioParams, SampleFormat};
use filter::FilterEvent;
use registry::Registry;
use rtc::OpenSslContext;
use rtc::sdp::{
    BundlePolicy, Codec as SdpCodec, Codecs, Direction as SdpDirection, MediaId,
    RtcpMuxPolicy, SdpSession, SdpSessionConfig, TransportType,
};
use sdp_types::{MediaType, SessionDescription};
use sip_ua::{Codec as NegotiatedCodec, MediaBackend, MediaEvent, RtcMediaBackend, RtcMediaBackendError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Interval;

/// How a call's media sockets reach the outside world. Only the strategies
/// `media/rtc`'s own `SdpSession` natively understands are wired here; `TURN` and the
/// standalone `mnat` ICE path exist as a separately tested, self-contained component
/// (the `mnat` crate) but are not plumbed into this backend (see DESIGN.md's Open
/// Question decision).
#[derive(Debug, Clone)]
pub enum MediaNatConfig {
    None,
    Stun(SocketAddr),
    Ice { stun: Option<SocketAddr> },
}

/// Audio device/codec parameters a [`CallMediaBackend`] is built with (from the
/// account/config layer's `audio_source`/`audio_sink`/`audio_srate`/`audio_channels`/
/// `ptime` keys).
#[derive(Debug, Clone)]
pub struct AudioDeviceConfig {
    pub source: String,
    pub sink: String,
    pub sample_rate: u32,
    pub channels: u8,
    pub ptime: Duration,
}

impl Default for AudioDeviceConfig {
    fn default() -> Self {
        Self {
            source: "sine".to_owned(),
            sink: "silence".to_owned(),
            sample_rate: 8000,
            channels: 1,
            ptime: audio_pipeline::DEFAULT_PTIME,
        }
    }
}

#[derive(Debug, Error)]
pub enum CallMediaError {
    #[error(transparent)]
    Rtc(#[from] RtcMediaBackendError),
    #[error(transparent)]
    Device(#[from] device::DeviceError),
    #[error(transparent)]
    Audio(#[from] AudioStreamError),
    #[error("peer negotiated unknown codec {0:?}")]
    UnknownCodec(String),
}

/// Event surfaced from [`CallMediaBackend::run`]; `Call` turns these into event-bus
/// publications (DTMF relay, and the `vumeter` module's `VuTx`/`VuRx` level taps).
#[derive(Debug, Clone, Copy)]
pub enum CallMediaEvent {
    DtmfPressed(char),
    DtmfReleased(char),
    VuTx(f32),
    VuRx(f32),
}

pub struct CallMediaBackend {
    rtc: RtcMediaBackend,
    registry: Arc<Registry>,
    audio_device: AudioDeviceConfig,

    pending: VecDeque<CallMediaEvent>,
    stream_events_tx: mpsc::Sender<AudioStreamEvent>,
    stream_events_rx: mpsc::Receiver<AudioStreamEvent>,
    vu_ticker: Interval,

    tx_metrics: HashMap<MediaId, Arc<AudioMetrics>>,
    rx_metrics: HashMap<MediaId, Arc<AudioMetrics>>,
}

impl CallMediaBackend {
    pub fn new(
        local_addr: std::net::IpAddr,
        nat: MediaNatConfig,
        registry: Arc<Registry>,
        audio_device: AudioDeviceConfig,
    ) -> Result<Self, CallMediaError> {
        let ssl_context = OpenSslContext::try_new().expect("failed to build DTLS-SRTP context");

        let (offer_ice, stun) = match nat {
            MediaNatConfig::None => (false, None),
            MediaNatConfig::Stun(server) => (false, Some(server)),
            MediaNatConfig::Ice { stun } => (true, stun),
        };

        let mut sdp_session = SdpSession::new(
            ssl_context,
            local_addr,
            SdpSessionConfig {
                offer_transport: TransportType::DtlsSrtp,
                offer_ice,
                offer_avpf: false,
                rtcp_mux_policy: RtcpMuxPolicy::Negotiate,
                bundle_policy: BundlePolicy::MaxBundle,
                mtu: Default::default(),
            },
        );

        if let Some(server) = stun {
            sdp_session.add_stun_server(server);
        }

        let mut codecs = Codecs::new(MediaType::Audio).allow_dtmf(true);
        for descriptor in &registry.codecs {
            let mut codec = SdpCodec::new(descriptor.name, descriptor.clock_rate)
                .with_channels(descriptor.channels as u32);
            if let Some(pt) = descriptor.static_pt {
                codec = codec.with_static_pt(pt);
            }
            codecs.add_codec(codec);
        }

        let local_media = sdp_session
            .add_local_media(codecs, SdpDirection::SendRecv)
            .expect("payload type range exhausted while registering builtin codecs");
        sdp_session.add_media(local_media, SdpDirection::SendRecv);

        let (stream_events_tx, stream_events_rx) = mpsc::channel(16);

        let mut vu_ticker = tokio::time::interval(Duration::from_secs(1));
        vu_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Ok(Self {
            rtc: RtcMediaBackend::new(sdp_session),
            registry,
            audio_device,
            pending: VecDeque::new(),
            stream_events_tx,
            stream_events_rx,
            vu_ticker,
            tx_metrics: HashMap::new(),
            rx_metrics: HashMap::new(),
        })
    }

    fn chain_params(&self, negotiated: &NegotiatedCodec) -> Result<ChainParams, CallMediaError> {
        let descriptor = self
            .registry
            .codec_by_name(&negotiated.name)
            .ok_or_else(|| CallMediaError::UnknownCodec(negotiated.name.to_string()))?;

        Ok(ChainParams {
            device_rate: self.audio_device.sample_rate,
            device_channels: self.audio_device.channels,
            device_format: SampleFormat::S16Le,
            codec_rate: descriptor.sample_rate,
            codec_channels: descriptor.channels,
        })
    }

    fn spawn_sender(
        &mut self,
        media_id: MediaId,
        sender: sip_ua::RtpSender,
        negotiated: NegotiatedCodec,
    ) -> Result<(), CallMediaError> {
        let descriptor = self
            .registry
            .codec_by_name(&negotiated.name)
            .ok_or_else(|| CallMediaError::UnknownCodec(negotiated.name.to_string()))?;
        let params = self.chain_params(&negotiated)?;

        let source = self.registry.devices.open_audio_source(
            &self.audio_device.source,
            AudioParams {
                sample_rate: self.audio_device.sample_rate,
                channels: self.audio_device.channels,
                format: SampleFormat::S16Le,
                ptime: self.audio_device.ptime,
            },
        )?;

        let (chain, _gain, _dtmf) = build_encode_chain(&params);
        let (stream, metrics) = AudioSendStream::new(source, chain, descriptor.new_instance(), negotiated.pt, sender);
        self.tx_metrics.insert(media_id, metrics);

        tokio::spawn(async move {
            if let Err(e) = stream.run().await {
                log::warn!("audio send stream for media {media_id:?} ended: {e}");
            }
        });

        Ok(())
    }

    fn spawn_receiver(
        &mut self,
        media_id: MediaId,
        receiver: sip_ua::RtpReceiver,
        negotiated: NegotiatedCodec,
    ) -> Result<(), CallMediaError> {
        let descriptor = self
            .registry
            .codec_by_name(&negotiated.name)
            .ok_or_else(|| CallMediaError::UnknownCodec(negotiated.name.to_string()))?;
        let params = self.chain_params(&negotiated)?;

        let sink = self.registry.devices.open_audio_sink(
            &self.audio_device.sink,
            AudioParams {
                sample_rate: self.audio_device.sample_rate,
                channels: self.audio_device.channels,
                format: SampleFormat::S16Le,
                ptime: self.audio_device.ptime,
            },
        )?;

        let (chain, _gain) = build_decode_chain(&params);
        let ptime = self.audio_device.ptime;
        let frame_bytes = (descriptor.sample_rate as usize * ptime.as_millis() as usize / 1000)
            * descriptor.channels as usize;

        let (stream, metrics) = AudioRecvStream::new(
            receiver,
            Arc::new(jitter::JitterBuffer::new(frame_bytes, frame_bytes * 10)),
            descriptor.new_instance(),
            chain,
            sink,
            frame_bytes,
            self.audio_device.sample_rate,
            self.audio_device.channels,
            ptime,
        );
        self.rx_metrics.insert(media_id, metrics);

        let events = self.stream_events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = stream.run(events).await {
                log::warn!("audio recv stream for media {media_id:?} ended: {e}");
            }
        });

        Ok(())
    }
}

impl MediaBackend for CallMediaBackend {
    type Error = CallMediaError;
    type Event = CallMediaEvent;

    fn has_media(&self) -> bool {
        self.rtc.has_media()
    }

    async fn create_sdp_offer(&mut self) -> Result<SessionDescription, Self::Error> {
        Ok(self.rtc.create_sdp_offer().await?)
    }

    async fn receive_sdp_answer(&mut self, sdp: SessionDescription) -> Result<(), Self::Error> {
        Ok(self.rtc.receive_sdp_answer(sdp).await?)
    }

    async fn receive_sdp_offer(
        &mut self,
        sdp: SessionDescription,
    ) -> Result<SessionDescription, Self::Error> {
        Ok(self.rtc.receive_sdp_offer(sdp).await?)
    }

    async fn run(&mut self) -> Result<Self::Event, Self::Error> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            tokio::select! {
                event = self.rtc.run() => {
                    match event? {
                        MediaEvent::SenderAdded { sender, codec } => {
                            self.spawn_sender(sender.media_id(), sender, codec)?;
                        }
                        MediaEvent::ReceiverAdded { receiver, codec } => {
                            self.spawn_receiver(receiver.media_id(), receiver, codec)?;
                        }
                    }
                }
                Some(event) = self.stream_events_rx.recv() => {
                    let AudioStreamEvent::Filter(filter_event) = event;
                    match filter_event {
                        FilterEvent::DtmfPressed(d) => return Ok(CallMediaEvent::DtmfPressed(d)),
                        FilterEvent::DtmfReleased(d) => return Ok(CallMediaEvent::DtmfReleased(d)),
                        FilterEvent::Vad(_) => {}
                    }
                }
                _ = self.vu_ticker.tick() => {
                    for metrics in self.tx_metrics.values() {
                        self.pending.push_back(CallMediaEvent::VuTx(metrics.level_dbov()));
                    }
                    for metrics in self.rx_metrics.values() {
                        self.pending.push_back(CallMediaEvent::VuRx(metrics.level_dbov()));
                    }
                }
            }
        }
    }
}
