//! Per-direction video stream wiring (component C7, SPEC_FULL §4.6's "analogous to
//! C6" note): capture → scale/self-view composite → fragment → RTP sender on the send
//! side, RTP receiver → reassemble → self-view composite → render on the receive
//! side.
//!
//! No video DSP/codec crate exists anywhere in the retrieved corpus (see DESIGN.md's
//! dropped-dependency note on the h264/libva/vulkan crates), so frames travel
//! uncompressed. RFC 6184-style H.264 fragmentation isn't applicable without a real
//! bitstream, and `rtc::rtp_session::SendRtpPacket`'s marker-bit field isn't settable
//! through its public `new` constructor in this retrieval, so frame boundaries are
//! carried by a 3-byte in-payload header (`frame_id`, `fragment_index`,
//! `fragment_count`) instead of the RTP marker bit a real video payload format would
//! use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use device::{PixelFormat, VideoFrame, VideoSink, VideoSource};
use rtc::rtp_session::SendRtpPacket;
use sip_ua::{RtpReceiver, RtpSender};
use thiserror::Error;

/// Leaves headroom under a conservative 1400-byte path MTU for the IP/UDP/RTP headers.
pub const MAX_FRAGMENT_PAYLOAD: usize = 1200;
const FRAGMENT_HEADER_LEN: usize = 3;

#[derive(Debug, Error)]
pub enum VideoStreamError {
    #[error("capture/render device error: {0}")]
    Device(#[from] device::DeviceError),
    #[error("RTP sender is shut down")]
    SenderClosed,
    #[error("operation not supported for pixel format {0:?}")]
    NotSupported(PixelFormat),
}

#[derive(Default)]
pub struct VideoMetrics {
    packets: AtomicU64,
    bytes: AtomicU64,
    frames_dropped_incomplete: AtomicU64,
}

impl VideoMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, byte_len: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(byte_len as u64, Ordering::Relaxed);
    }

    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn frames_dropped_incomplete(&self) -> u64 {
        self.frames_dropped_incomplete.load(Ordering::Relaxed)
    }
}

fn plane_len(format: PixelFormat, width: u32, height: u32) -> usize {
    let luma = (width * height) as usize;
    match format {
        PixelFormat::I420 | PixelFormat::Nv12 => luma + luma / 2,
        PixelFormat::Rgb24 => luma * 3,
    }
}

/// Nearest-neighbour scale to `target_width`x`target_height`. I420/NV12 are scaled on
/// the luma plane only, leaving chroma subsampled-but-stretched, a cheap stand-in for
/// a real chroma-aware scaler; RGB24 is scaled per-channel.
pub fn scale(frame: &VideoFrame, target_width: u32, target_height: u32) -> VideoFrame {
    if frame.width == target_width && frame.height == target_height {
        return frame.clone();
    }

    let bytes_per_pixel = match frame.format {
        PixelFormat::Rgb24 => 3,
        PixelFormat::I420 | PixelFormat::Nv12 => 1,
    };

    let src_luma_len = (frame.width * frame.height) as usize * bytes_per_pixel;
    let mut luma = Vec::with_capacity((target_width * target_height) as usize * bytes_per_pixel);
    for y in 0..target_height {
        let src_y = (y * frame.height) / target_height.max(1);
        for x in 0..target_width {
            let src_x = (x * frame.width) / target_width.max(1);
            let src_index = (src_y * frame.width + src_x) as usize * bytes_per_pixel;
            if src_index + bytes_per_pixel <= src_luma_len {
                luma.extend_from_slice(&frame.data[src_index..src_index + bytes_per_pixel]);
            } else {
                luma.extend(std::iter::repeat_n(0u8, bytes_per_pixel));
            }
        }
    }

    let data = match frame.format {
        PixelFormat::Rgb24 => luma,
        PixelFormat::I420 | PixelFormat::Nv12 => {
            let chroma_len = plane_len(frame.format, target_width, target_height) - luma.len();
            let mut out = luma;
            out.resize(out.len() + chroma_len, 128);
            out
        }
    };

    VideoFrame {
        format: frame.format,
        width: target_width,
        height: target_height,
        data,
        timestamp_us: frame.timestamp_us,
    }
}

/// Composites `overlay` into the bottom-right corner of `base` (self-view picture in
/// picture, SPEC_FULL §4.6/C7 "self-view compositing"). Operates on RGB24's full pixel
/// data; on I420/NV12 only the luma plane is overlaid, which is visually indistinguishable
/// for a small preview thumbnail but leaves chroma from the base frame underneath.
pub fn composite_self_view(base: &mut VideoFrame, overlay: &VideoFrame) -> Result<(), VideoStreamError> {
    if base.format != overlay.format {
        return Err(VideoStreamError::NotSupported(overlay.format));
    }
    if overlay.width > base.width || overlay.height > base.height {
        return Ok(());
    }

    let bytes_per_pixel = match base.format {
        PixelFormat::Rgb24 => 3,
        PixelFormat::I420 | PixelFormat::Nv12 => 1,
    };

    let margin = 8u32;
    let origin_x = base.width.saturating_sub(overlay.width + margin);
    let origin_y = base.height.saturating_sub(overlay.height + margin);

    for oy in 0..overlay.height {
        let base_y = origin_y + oy;
        for ox in 0..overlay.width {
            let base_x = origin_x + ox;
            let src = (oy * overlay.width + ox) as usize * bytes_per_pixel;
            let dst = (base_y * base.width + base_x) as usize * bytes_per_pixel;
            if src + bytes_per_pixel <= overlay.data.len() && dst + bytes_per_pixel <= base.data.len() {
                base.data[dst..dst + bytes_per_pixel]
                    .copy_from_slice(&overlay.data[src..src + bytes_per_pixel]);
            }
        }
    }

    Ok(())
}

fn fragment(frame_id: u8, payload: &[u8]) -> Vec<Bytes> {
    let chunks: Vec<&[u8]> = if payload.is_empty() {
        vec![&[]]
    } else {
        payload.chunks(MAX_FRAGMENT_PAYLOAD).collect()
    };
    let fragment_count = chunks.len() as u8;

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let mut buf = Vec::with_capacity(FRAGMENT_HEADER_LEN + chunk.len());
            buf.push(frame_id);
            buf.push(index as u8);
            buf.push(fragment_count);
            buf.extend_from_slice(chunk);
            Bytes::from(buf)
        })
        .collect()
}

#[derive(Default)]
struct Reassembly {
    frame_id: Option<u8>,
    fragment_count: u8,
    fragments: HashMap<u8, Bytes>,
}

impl Reassembly {
    /// Feeds one fragment in. Returns the reassembled frame bytes once every fragment
    /// of its frame has arrived. A fragment belonging to a new `frame_id` discards any
    /// partially assembled previous frame (lost fragments never complete).
    fn push(&mut self, data: &[u8], metrics: &VideoMetrics) -> Option<Vec<u8>> {
        if data.len() < FRAGMENT_HEADER_LEN {
            return None;
        }
        let frame_id = data[0];
        let index = data[1];
        let count = data[2];
        let chunk = &data[FRAGMENT_HEADER_LEN..];

        if self.frame_id != Some(frame_id) {
            if self.frame_id.is_some() && self.fragments.len() < self.fragment_count as usize {
                metrics.frames_dropped_incomplete.fetch_add(1, Ordering::Relaxed);
            }
            self.frame_id = Some(frame_id);
            self.fragment_count = count;
            self.fragments.clear();
        }

        self.fragments.insert(index, Bytes::copy_from_slice(chunk));

        if self.fragments.len() == self.fragment_count as usize {
            let mut out = Vec::new();
            for i in 0..self.fragment_count {
                out.extend_from_slice(self.fragments.get(&i)?);
            }
            self.frame_id = None;
            self.fragments.clear();
            Some(out)
        } else {
            None
        }
    }
}

/// Owns the capture→scale/composite→RTP half of one video stream.
pub struct VideoSendStream {
    source: Box<dyn VideoSource>,
    target_width: u32,
    target_height: u32,
    self_view: Option<Arc<std::sync::Mutex<Option<VideoFrame>>>>,
    pt: u8,
    sender: RtpSender,
    frame_id: u8,
    metrics: Arc<VideoMetrics>,
}

impl VideoSendStream {
    pub fn new(
        source: Box<dyn VideoSource>,
        target_width: u32,
        target_height: u32,
        pt: u8,
        sender: RtpSender,
    ) -> (Self, Arc<VideoMetrics>) {
        let metrics = Arc::new(VideoMetrics::new());
        (
            Self {
                source,
                target_width,
                target_height,
                self_view: None,
                pt,
                sender,
                frame_id: 0,
                metrics: metrics.clone(),
            },
            metrics,
        )
    }

    pub async fn run(mut self) -> Result<(), VideoStreamError> {
        loop {
            let mut frame = self.source.read().await?;
            if frame.width != self.target_width || frame.height != self.target_height {
                frame = scale(&frame, self.target_width, self.target_height);
            }

            if let Some(self_view) = &self.self_view {
                *self_view.lock().unwrap() = Some(frame.clone());
            }

            let fragments = fragment(self.frame_id, &frame.data);
            self.frame_id = self.frame_id.wrapping_add(1);

            for payload in fragments {
                self.metrics.record(payload.len());
                let packet = SendRtpPacket::new(Instant::now(), self.pt, payload);
                self.sender
                    .send(packet)
                    .await
                    .map_err(|_| VideoStreamError::SenderClosed)?;
            }
        }
    }
}

/// Owns the RTP→reassemble→composite→render half of one video stream.
pub struct VideoRecvStream {
    receiver: RtpReceiver,
    sink: Box<dyn VideoSink>,
    format: PixelFormat,
    width: u32,
    height: u32,
    self_view: Option<Arc<std::sync::Mutex<Option<VideoFrame>>>>,
    metrics: Arc<VideoMetrics>,
}

impl VideoRecvStream {
    pub fn new(
        receiver: RtpReceiver,
        sink: Box<dyn VideoSink>,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> (Self, Arc<VideoMetrics>) {
        let metrics = Arc::new(VideoMetrics::new());
        (
            Self {
                receiver,
                sink,
                format,
                width,
                height,
                self_view: None,
                metrics: metrics.clone(),
            },
            metrics,
        )
    }

    /// Shares a self-view slot with a [`VideoSendStream`]: each rendered remote frame
    /// gets the most recently captured local frame composited into its corner.
    pub fn with_self_view(mut self, slot: Arc<std::sync::Mutex<Option<VideoFrame>>>) -> Self {
        self.self_view = Some(slot);
        self
    }

    pub async fn run(mut self) -> Result<(), VideoStreamError> {
        let mut reassembly = Reassembly::default();

        loop {
            let packet = match self.receiver.recv().await {
                Some(packet) => packet,
                None => return Ok(()),
            };
            self.metrics.record(packet.payload.len());

            let Some(data) = reassembly.push(&packet.payload, &self.metrics) else {
                continue;
            };

            let mut frame = VideoFrame {
                format: self.format,
                width: self.width,
                height: self.height,
                data,
                timestamp_us: 0,
            };

            if let Some(self_view) = &self.self_view {
                if let Some(overlay) = self_view.lock().unwrap().clone() {
                    let thumb = scale(&overlay, self.width / 4, self.height / 4);
                    let _ = composite_self_view(&mut frame, &thumb);
                }
            }

            self.sink.write(frame).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32, fill: u8) -> VideoFrame {
        VideoFrame {
            format: PixelFormat::Rgb24,
            width,
            height,
            data: vec![fill; (width * height * 3) as usize],
            timestamp_us: 0,
        }
    }

    #[test]
    fn scale_is_a_no_op_when_dimensions_already_match() {
        let frame = rgb_frame(4, 4, 10);
        let scaled = scale(&frame, 4, 4);
        assert_eq!(scaled.data, frame.data);
    }

    #[test]
    fn scale_produces_the_requested_dimensions() {
        let frame = rgb_frame(4, 4, 10);
        let scaled = scale(&frame, 8, 2);
        assert_eq!(scaled.width, 8);
        assert_eq!(scaled.height, 2);
        assert_eq!(scaled.data.len(), 8 * 2 * 3);
    }

    #[test]
    fn composite_self_view_writes_overlay_pixels_into_the_corner() {
        let mut base = rgb_frame(10, 10, 0);
        let overlay = rgb_frame(2, 2, 255);
        composite_self_view(&mut base, &overlay).unwrap();

        let margin = 8usize;
        let origin_x = 10 - (2 + margin);
        let origin_y = 10 - (2 + margin);
        let idx = (origin_y * 10 + origin_x) * 3;
        assert_eq!(base.data[idx], 255);
    }

    #[test]
    fn composite_rejects_mismatched_formats() {
        let mut base = rgb_frame(4, 4, 0);
        let overlay = VideoFrame {
            format: PixelFormat::I420,
            width: 2,
            height: 2,
            data: vec![0; 6],
            timestamp_us: 0,
        };
        assert!(composite_self_view(&mut base, &overlay).is_err());
    }

    #[test]
    fn fragment_then_reassemble_round_trips_small_payload() {
        let payload = vec![1, 2, 3, 4, 5];
        let fragments = fragment(7, &payload);
        assert_eq!(fragments.len(), 1);

        let metrics = VideoMetrics::new();
        let mut reassembly = Reassembly::default();
        let out = reassembly.push(&fragments[0], &metrics).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn fragment_then_reassemble_round_trips_large_payload() {
        let payload = vec![42u8; MAX_FRAGMENT_PAYLOAD * 3 + 17];
        let fragments = fragment(1, &payload);
        assert_eq!(fragments.len(), 4);

        let metrics = VideoMetrics::new();
        let mut reassembly = Reassembly::default();
        let mut out = None;
        for f in &fragments {
            out = reassembly.push(f, &metrics);
        }
        assert_eq!(out.unwrap(), payload);
    }

    #[test]
    fn incomplete_frame_is_dropped_and_counted_when_a_new_frame_starts() {
        let payload = vec![9u8; MAX_FRAGMENT_PAYLOAD * 2 + 1];
        let fragments = fragment(1, &payload);
        assert_eq!(fragments.len(), 3);

        let metrics = VideoMetrics::new();
        let mut reassembly = Reassembly::default();
        // Only feed the first fragment of frame 1, then jump straight to frame 2.
        assert!(reassembly.push(&fragments[0], &metrics).is_none());

        let next_frame = fragment(2, &[1, 2, 3]);
        reassembly.push(&next_frame[0], &metrics);

        assert_eq!(metrics.frames_dropped_incomplete(), 1);
    }
}
