//! Gain filter, grounded in `original_source/modules/augain/augain.c`: scales 16-bit
//! PCM by a factor, clamped so the largest absolute sample in the frame cannot exceed
//! `i16::MAX`. The factor is updated at runtime by the `augain` CLI command, so it is
//! shared via an atomic rather than held privately.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use device::AudioFrame;

use crate::{Filter, FilterError, FilterEvent};

#[derive(Clone)]
pub struct GainControl {
    factor_bits: Arc<AtomicU32>,
}

impl GainControl {
    pub fn new(initial_factor: f32) -> Self {
        Self {
            factor_bits: Arc::new(AtomicU32::new(initial_factor.to_bits())),
        }
    }

    pub fn set(&self, factor: f32) {
        self.factor_bits.store(factor.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.factor_bits.load(Ordering::Relaxed))
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

pub struct Gain {
    control: GainControl,
}

impl Gain {
    pub fn new(control: GainControl) -> Self {
        Self { control }
    }
}

impl Filter for Gain {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        let samples = frame.as_s16le();
        if samples.is_empty() {
            return Ok(None);
        }

        let requested = self.control.get();

        // Clamp so the loudest sample in the frame cannot exceed i16::MAX, mirroring
        // augain.c's `highest_possible_gain` guard.
        let highest_abs = samples.iter().map(|s| (*s as i32).unsigned_abs()).max().unwrap_or(1).max(1);
        let highest_possible_gain = i16::MAX as f32 / highest_abs as f32;
        let effective = requested.min(highest_possible_gain);

        let scaled: Vec<i16> = samples
            .iter()
            .map(|s| ((*s as f32) * effective) as i16)
            .collect();

        *frame = AudioFrame::from_s16le(
            &scaled,
            frame.sample_rate,
            frame.channels,
            frame.capture_timestamp_us,
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_is_clamped_to_avoid_clipping() {
        let control = GainControl::new(100.0);
        let mut gain = Gain::new(control);
        let mut frame = AudioFrame::from_s16le(&[20000, -20000], 8000, 1, 0);
        gain.process(&mut frame).unwrap();
        for s in frame.as_s16le() {
            assert!(s.unsigned_abs() <= i16::MAX as u16);
        }
    }

    #[test]
    fn gain_below_clamp_applies_exactly() {
        let control = GainControl::new(2.0);
        let mut gain = Gain::new(control);
        let mut frame = AudioFrame::from_s16le(&[100, -100], 8000, 1, 0);
        gain.process(&mut frame).unwrap();
        assert_eq!(frame.as_s16le(), vec![200, -200]);
    }
}
