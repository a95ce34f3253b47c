//! Resampler, grounded in `original_source/modules/auresamp/auresamp.c`: resamples to
//! a target rate/channel-count only when the incoming frame doesn't already match,
//! mirroring the original's early-return fast path.

use device::{AudioFrame, SampleFormat};

use crate::{Filter, FilterError, FilterEvent};

pub struct Resampler {
    target_rate: u32,
    target_channels: u8,
}

impl Resampler {
    pub fn new(target_rate: u32, target_channels: u8) -> Self {
        Self {
            target_rate,
            target_channels,
        }
    }

    /// Whether this stream needs a resampler at all, per SPEC_FULL §4.4 "inserted only
    /// when needed (decided at `encode_update`)".
    pub fn is_needed(source_rate: u32, source_channels: u8, target_rate: u32, target_channels: u8) -> bool {
        source_rate != target_rate || source_channels != target_channels
    }
}

fn resample_channel(input: &[i16], target_len: usize) -> Vec<i16> {
    if input.is_empty() || target_len == 0 {
        return vec![0; target_len];
    }
    if input.len() == target_len {
        return input.to_vec();
    }

    let ratio = (input.len() - 1) as f64 / (target_len.max(1) - 1).max(1) as f64;
    (0..target_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(input.len() - 1);
            let frac = (pos - lo as f64) as f32;
            let a = input[lo] as f32;
            let b = input[hi] as f32;
            (a + (b - a) * frac) as i16
        })
        .collect()
}

fn remix_channels(samples: &[i16], from_channels: u8, to_channels: u8) -> Vec<i16> {
    if from_channels == to_channels {
        return samples.to_vec();
    }
    let frames = samples.len() / from_channels.max(1) as usize;
    let mut out = Vec::with_capacity(frames * to_channels as usize);
    for f in 0..frames {
        let base = f * from_channels as usize;
        if from_channels == 2 && to_channels == 1 {
            let l = samples[base] as i32;
            let r = samples[base + 1] as i32;
            out.push(((l + r) / 2) as i16);
        } else if from_channels == 1 && to_channels == 2 {
            out.push(samples[base]);
            out.push(samples[base]);
        } else {
            for c in 0..to_channels {
                out.push(samples[base + (c as usize % from_channels as usize)]);
            }
        }
    }
    out
}

impl Filter for Resampler {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        if !Self::is_needed(
            frame.sample_rate,
            frame.channels,
            self.target_rate,
            self.target_channels,
        ) {
            return Ok(None);
        }

        let source_format = frame.format;
        let as_s16 = if source_format == SampleFormat::S16Le {
            frame.as_s16le()
        } else {
            return Err(FilterError::NotSupported);
        };

        let remixed = remix_channels(&as_s16, frame.channels, self.target_channels);

        let source_frames = remixed.len() / self.target_channels.max(1) as usize;
        let target_frames =
            (source_frames as u64 * self.target_rate as u64 / frame.sample_rate as u64) as usize;

        let mut out = Vec::with_capacity(target_frames * self.target_channels as usize);
        for c in 0..self.target_channels {
            let channel_samples: Vec<i16> = remixed
                .iter()
                .skip(c as usize)
                .step_by(self.target_channels.max(1) as usize)
                .copied()
                .collect();
            let resampled = resample_channel(&channel_samples, target_frames);
            if c == 0 {
                out = vec![0; target_frames * self.target_channels as usize];
            }
            for (i, s) in resampled.into_iter().enumerate() {
                out[i * self.target_channels as usize + c as usize] = s;
            }
        }

        *frame = AudioFrame::from_s16le(
            &out,
            self.target_rate,
            self.target_channels,
            frame.capture_timestamp_us,
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_rate_and_channels_already_match() {
        let mut r = Resampler::new(8000, 1);
        let mut frame = AudioFrame::from_s16le(&[1, 2, 3, 4], 8000, 1, 0);
        let before = frame.data.clone();
        r.process(&mut frame).unwrap();
        assert_eq!(frame.data, before);
    }

    #[test]
    fn upsamples_changes_rate_and_sample_count() {
        let mut r = Resampler::new(16000, 1);
        let mut frame = AudioFrame::from_s16le(&[0, 1000, 2000, 3000], 8000, 1, 0);
        r.process(&mut frame).unwrap();
        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.sample_count, 8);
    }

    #[test]
    fn downmixes_stereo_to_mono() {
        let mut r = Resampler::new(8000, 1);
        let mut frame = AudioFrame::from_s16le(&[100, 200, 300, 400], 8000, 2, 0);
        r.process(&mut frame).unwrap();
        assert_eq!(frame.channels, 1);
    }
}
