//! Voice activity detection, grounded in `original_source/modules/fvad/fvad.c`: mono
//! S16LE only, processes the largest chunk size that evenly divides the frame
//! (30/20/10 ms, largest first as the original tries), emits a `Vad` event only on a
//! state transition.

use device::{AudioFrame, SampleFormat};

use crate::{Filter, FilterError, FilterEvent};

const CHUNK_TIMES_MS: [u32; 3] = [30, 20, 10];

/// Simple energy threshold standing in for libfvad's classifier, which isn't part of
/// this corpus's dependency stack.
const ENERGY_THRESHOLD: i64 = 400 * 400;

pub struct Vad {
    active: Option<bool>,
}

impl Vad {
    pub fn new() -> Self {
        Self { active: None }
    }

    fn chunk_samples(sample_rate: u32, frame_samples: usize) -> usize {
        for ms in CHUNK_TIMES_MS {
            let n = (sample_rate as usize * ms as usize) / 1000;
            if n > 0 && frame_samples % n == 0 {
                return n;
            }
        }
        frame_samples.max(1)
    }
}

impl Default for Vad {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for Vad {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        if frame.format != SampleFormat::S16Le || frame.channels != 1 {
            return Err(FilterError::NotSupported);
        }

        let samples = frame.as_s16le();
        if samples.is_empty() {
            return Ok(None);
        }

        let chunk_len = Self::chunk_samples(frame.sample_rate, samples.len());
        let mut any_active = false;
        for chunk in samples.chunks(chunk_len) {
            let energy: i64 = chunk.iter().map(|s| (*s as i64) * (*s as i64)).sum();
            let mean_energy = energy / chunk.len().max(1) as i64;
            if mean_energy > ENERGY_THRESHOLD {
                any_active = true;
                break;
            }
        }

        let transitioned = self.active != Some(any_active);
        self.active = Some(any_active);

        if transitioned {
            Ok(Some(FilterEvent::Vad(any_active)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_does_not_trigger_vad() {
        let mut vad = Vad::new();
        let mut frame = AudioFrame::silence(SampleFormat::S16Le, 8000, 1, 160, 0);
        let event = vad.process(&mut frame).unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn loud_tone_triggers_single_transition_event() {
        let mut vad = Vad::new();
        let samples: Vec<i16> = (0..160).map(|i| if i % 2 == 0 { 20000 } else { -20000 }).collect();

        let mut frame1 = AudioFrame::from_s16le(&samples, 8000, 1, 0);
        let event1 = vad.process(&mut frame1).unwrap();
        assert_eq!(event1, Some(FilterEvent::Vad(true)));

        let mut frame2 = AudioFrame::from_s16le(&samples, 8000, 1, 20_000);
        let event2 = vad.process(&mut frame2).unwrap();
        assert_eq!(event2, None);
    }
}
