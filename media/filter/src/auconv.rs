//! Sample-format converter, grounded in `original_source/modules/auconv/auconv.c`:
//! converts to a configured target format via a 16-bit linear PCM intermediate, and
//! passes the frame through unchanged when it is already in the target format.

use device::{AudioFrame, SampleFormat};

use crate::{Filter, FilterError, FilterEvent};

pub struct SampleFormatConverter {
    target: SampleFormat,
}

impl SampleFormatConverter {
    pub fn new(target: SampleFormat) -> Self {
        Self { target }
    }
}

fn to_s16(format: SampleFormat, data: &[u8]) -> Vec<i16> {
    match format {
        SampleFormat::S16Le => data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect(),
        SampleFormat::Float => data
            .chunks_exact(4)
            .map(|b| {
                let f = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                (f.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            })
            .collect(),
        SampleFormat::ALaw => data.iter().copied().map(g711::alaw::decode).collect(),
        SampleFormat::ULaw => data.iter().copied().map(g711::mulaw::decode).collect(),
    }
}

fn from_s16(format: SampleFormat, samples: &[i16]) -> Vec<u8> {
    match format {
        SampleFormat::S16Le => samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        SampleFormat::Float => samples
            .iter()
            .flat_map(|s| (*s as f32 / i16::MAX as f32).to_le_bytes())
            .collect(),
        SampleFormat::ALaw => samples.iter().copied().map(g711::alaw::encode).collect(),
        SampleFormat::ULaw => samples.iter().copied().map(g711::mulaw::encode).collect(),
    }
}

impl Filter for SampleFormatConverter {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
        if frame.format == self.target {
            return Ok(None);
        }

        let s16 = to_s16(frame.format, &frame.data);
        let data = from_s16(self.target, &s16);

        frame.format = self.target;
        frame.data = data;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_already_target_format() {
        let mut conv = SampleFormatConverter::new(SampleFormat::S16Le);
        let mut frame = AudioFrame::from_s16le(&[1, 2, 3], 8000, 1, 0);
        let before = frame.data.clone();
        conv.process(&mut frame).unwrap();
        assert_eq!(frame.data, before);
    }

    #[test]
    fn s16_to_float_to_s16_is_identity_within_one_lsb() {
        let mut to_float = SampleFormatConverter::new(SampleFormat::Float);
        let mut frame = AudioFrame::from_s16le(&[1000, -1000, 0, 30000], 8000, 1, 0);
        to_float.process(&mut frame).unwrap();
        assert_eq!(frame.format, SampleFormat::Float);

        let mut back = SampleFormatConverter::new(SampleFormat::S16Le);
        back.process(&mut frame).unwrap();
        let roundtripped = frame.as_s16le();
        for (a, b) in [1000i16, -1000, 0, 30000].iter().zip(roundtripped.iter()) {
            assert!((a - b).abs() <= 1);
        }
    }
}
