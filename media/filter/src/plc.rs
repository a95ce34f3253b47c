//! Packet-loss concealment, grounded in `original_source/modules/plc/plc.c`: decode
//! path only, mono S16LE only. A frame with `sample_count == 0` signals a lost packet;
//! the filter fills in a replacement of the last known sample count by repeating and
//! fading the last good frame, then updates its last-known state on the next good frame
//! (mirroring `plc_rx`/`plc_fillin`).

use device::{AudioFrame, SampleFormat};

use crate::{Filter, FilterError, FilterEvent};

pub struct Plc {
    last_samples: Vec<i16>,
    last_sample_rate: u32,
    last_channels: u8,
}

impl Plc {
    pub fn new() -> Self {
        Self {
            last_samples: Vec::new(),
            last_sample_rate: 8000,
            last_channels: 1,
        }
    }
}

impl Default for Plc {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for Plc {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        if frame.format != SampleFormat::S16Le || frame.channels != 1 {
            return Err(FilterError::NotSupported);
        }

        if frame.sample_count == 0 {
            let count = self.last_samples.len();
            // Fade the repeated frame toward silence so back-to-back concealment
            // doesn't ring forever, a cheap stand-in for spandsp's richer model.
            let concealed: Vec<i16> = self
                .last_samples
                .iter()
                .map(|s| (*s as i32 * 3 / 4) as i16)
                .collect();
            self.last_samples = concealed.clone();

            *frame = AudioFrame::from_s16le(
                &concealed,
                self.last_sample_rate,
                self.last_channels,
                frame.capture_timestamp_us,
            );
            frame.sample_count = count;
            return Ok(None);
        }

        self.last_samples = frame.as_s16le();
        self.last_sample_rate = frame.sample_rate;
        self.last_channels = frame.channels;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn good_frame_updates_last_known_state() {
        let mut plc = Plc::new();
        let mut frame = AudioFrame::from_s16le(&[100, 200, 300], 8000, 1, 0);
        plc.process(&mut frame).unwrap();
        assert_eq!(frame.sample_count, 3);
    }

    #[test]
    fn lost_frame_is_concealed_with_last_known_sample_count() {
        let mut plc = Plc::new();
        let mut good = AudioFrame::from_s16le(&[100, 200, 300], 8000, 1, 0);
        plc.process(&mut good).unwrap();

        let mut lost = AudioFrame::from_s16le(&[], 8000, 1, 20_000);
        lost.sample_count = 0;
        plc.process(&mut lost).unwrap();
        assert_eq!(lost.sample_count, 3);
        assert_eq!(lost.as_s16le().len(), 3);
    }
}
