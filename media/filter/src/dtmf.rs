//! DTMF decode/encode filters, grounded in `original_source/modules/dtmf/dtmf.c`.
//!
//! Decode watches decode-path samples with a Goertzel tone detector and emits
//! `DtmfPressed`/`DtmfReleased` with a 50 ms debounce per digit, forwarding audio
//! unchanged. Encode queues digits and overwrites the passing frame with tone samples
//! until the queue drains, exactly mirroring the original's tone-queue/`mbuf` approach
//! expressed with a `VecDeque` instead.

use std::collections::VecDeque;
use std::f32::consts::PI;

use device::{AudioFrame, SampleFormat};

use crate::{Filter, FilterError, FilterEvent};

const ROW_FREQS: [f32; 4] = [697.0, 770.0, 852.0, 941.0];
const COL_FREQS: [f32; 4] = [1209.0, 1336.0, 1477.0, 1633.0];
const DIGIT_MAP: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

const DEBOUNCE_US: u64 = 50_000;
const DETECT_THRESHOLD: f32 = 1.0e6;

fn goertzel_power(samples: &[i16], sample_rate: u32, freq: f32) -> f32 {
    let n = samples.len() as f32;
    let k = (0.5 + n * freq / sample_rate as f32).floor();
    let omega = 2.0 * PI * k / n;
    let coeff = 2.0 * omega.cos();

    let (mut s_prev, mut s_prev2) = (0.0f32, 0.0f32);
    for &sample in samples {
        let s = sample as f32 + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }

    s_prev2 * s_prev2 + s_prev * s_prev - coeff * s_prev * s_prev2
}

fn detect_digit(samples: &[i16], sample_rate: u32) -> Option<char> {
    if samples.len() < 32 {
        return None;
    }

    let row_powers: Vec<f32> = ROW_FREQS
        .iter()
        .map(|f| goertzel_power(samples, sample_rate, *f))
        .collect();
    let col_powers: Vec<f32> = COL_FREQS
        .iter()
        .map(|f| goertzel_power(samples, sample_rate, *f))
        .collect();

    let (row_idx, &row_power) = row_powers
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let (col_idx, &col_power) = col_powers
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;

    if row_power < DETECT_THRESHOLD || col_power < DETECT_THRESHOLD {
        return None;
    }

    Some(DIGIT_MAP[row_idx][col_idx])
}

pub struct DtmfDecoder {
    pressed: Option<char>,
    last_seen_us: u64,
    pending: VecDeque<FilterEvent>,
}

impl DtmfDecoder {
    pub fn new() -> Self {
        Self {
            pressed: None,
            last_seen_us: 0,
            pending: VecDeque::new(),
        }
    }
}

impl Default for DtmfDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for DtmfDecoder {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        if frame.format != SampleFormat::S16Le || frame.channels != 1 {
            return Err(FilterError::NotSupported);
        }

        let samples = frame.as_s16le();
        let detected = detect_digit(&samples, frame.sample_rate);
        let now = frame.capture_timestamp_us;

        match (self.pressed, detected) {
            (None, Some(d)) => {
                self.pressed = Some(d);
                self.last_seen_us = now;
                self.pending.push_back(FilterEvent::DtmfPressed(d));
            }
            (Some(p), Some(d)) if d == p => {
                self.last_seen_us = now;
            }
            (Some(p), Some(d)) => {
                self.pending.push_back(FilterEvent::DtmfReleased(p));
                self.pressed = Some(d);
                self.last_seen_us = now;
                self.pending.push_back(FilterEvent::DtmfPressed(d));
            }
            (Some(p), None) => {
                if now.saturating_sub(self.last_seen_us) >= DEBOUNCE_US {
                    self.pending.push_back(FilterEvent::DtmfReleased(p));
                    self.pressed = None;
                }
            }
            (None, None) => {}
        }

        Ok(self.pending.pop_front())
    }
}

struct PlayState {
    digit: char,
    phase_row: f32,
    phase_col: f32,
    samples_remaining: usize,
    in_gap: bool,
}

pub struct DtmfEncoder {
    queue: VecDeque<char>,
    state: Option<PlayState>,
    tone_ms: u32,
    gap_ms: u32,
}

impl DtmfEncoder {
    pub fn new(tone_ms: u32, gap_ms: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            state: None,
            tone_ms,
            gap_ms,
        }
    }

    /// Queues `digits` for playout. Rejects characters outside the DTMF charset
    /// (0-9, A-D, *, #), mirroring the original's validation.
    pub fn send(&mut self, digits: &str) -> Result<(), FilterError> {
        for c in digits.chars() {
            if !is_dtmf_char(c) {
                return Err(FilterError::NotSupported);
            }
        }
        self.queue.extend(digits.chars());
        Ok(())
    }

    fn freqs_for(digit: char) -> (f32, f32) {
        for (r, row) in DIGIT_MAP.iter().enumerate() {
            if let Some(c) = row.iter().position(|d| *d == digit) {
                return (ROW_FREQS[r], COL_FREQS[c]);
            }
        }
        (ROW_FREQS[0], COL_FREQS[0])
    }
}

fn is_dtmf_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, 'A'..='D' | '*' | '#')
}

impl Default for DtmfEncoder {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

impl Filter for DtmfEncoder {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        if self.state.is_none() {
            match self.queue.pop_front() {
                Some(digit) => {
                    let samples = (frame.sample_rate as u64 * self.tone_ms as u64 / 1000) as usize;
                    self.state = Some(PlayState {
                        digit,
                        phase_row: 0.0,
                        phase_col: 0.0,
                        samples_remaining: samples,
                        in_gap: false,
                    });
                }
                None => return Ok(None),
            }
        }

        let sample_rate = frame.sample_rate;
        let frame_len = frame.sample_count.max(1);
        let mut out = vec![0i16; frame_len];

        let mut i = 0;
        while i < frame_len {
            let Some(state) = &mut self.state else {
                break;
            };

            if state.samples_remaining == 0 {
                if state.in_gap {
                    self.state = None;
                    break;
                } else {
                    state.in_gap = true;
                    state.samples_remaining =
                        (sample_rate as u64 * self.gap_ms as u64 / 1000) as usize;
                    continue;
                }
            }

            if !state.in_gap {
                let (row_f, col_f) = DtmfEncoder::freqs_for(state.digit);
                let step_row = 2.0 * PI * row_f / sample_rate as f32;
                let step_col = 2.0 * PI * col_f / sample_rate as f32;
                let sample = ((state.phase_row.sin() + state.phase_col.sin()) * (i16::MAX as f32) / 4.0) as i16;
                out[i] = sample;
                state.phase_row = (state.phase_row + step_row) % (2.0 * PI);
                state.phase_col = (state.phase_col + step_col) % (2.0 * PI);
            }

            state.samples_remaining -= 1;
            i += 1;
        }

        *frame = AudioFrame::from_s16le(&out, frame.sample_rate, frame.channels, frame.capture_timestamp_us);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_frame(digit: char, sample_rate: u32, count: usize) -> AudioFrame {
        let (row, col) = DtmfEncoder::freqs_for(digit);
        let samples: Vec<i16> = (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (((2.0 * PI * row * t).sin() + (2.0 * PI * col * t).sin()) * 8000.0) as i16
            })
            .collect();
        AudioFrame::from_s16le(&samples, sample_rate, 1, 0)
    }

    #[test]
    fn decoder_detects_a_tone() {
        let mut decoder = DtmfDecoder::new();
        let mut frame = tone_frame('5', 8000, 160);
        let event = decoder.process(&mut frame).unwrap();
        assert_eq!(event, Some(FilterEvent::DtmfPressed('5')));
    }

    #[test]
    fn decoder_debounces_short_gaps() {
        let mut decoder = DtmfDecoder::new();
        let mut frame1 = tone_frame('5', 8000, 160);
        frame1.capture_timestamp_us = 0;
        decoder.process(&mut frame1).unwrap();

        // Brief silence under the 50ms debounce window: must not emit Released.
        let mut silence = AudioFrame::silence(SampleFormat::S16Le, 8000, 1, 160, 20_000);
        let event = decoder.process(&mut silence).unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn encoder_rejects_invalid_digits() {
        let mut encoder = DtmfEncoder::default();
        assert!(encoder.send("42X").is_err());
    }

    #[test]
    fn encoder_produces_nonzero_samples_while_playing() {
        let mut encoder = DtmfEncoder::new(20, 20);
        encoder.send("4").unwrap();
        let mut frame = AudioFrame::silence(SampleFormat::S16Le, 8000, 1, 160, 0);
        encoder.process(&mut frame).unwrap();
        assert!(frame.as_s16le().iter().any(|s| *s != 0));
    }
}
