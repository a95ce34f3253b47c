//! Encode/decode audio filter chain (component C3).
//!
//! Each filter is grounded in one `original_source/modules/*` file of the same purpose
//! (see the module-level doc comment on each submodule). The chain itself follows
//! SPEC_FULL §4.4: declaration order on the encode side, reverse order on the decode
//! side for the filters that are symmetric (auconv, auresamp, gain), declaration order
//! for the ones that are decode-only or encode-only (plc, dtmf decode, dtmf encode).

use device::AudioFrame;
use thiserror::Error;

pub mod auconv;
pub mod auresamp;
pub mod dtmf;
pub mod gain;
pub mod plc;
pub mod sndfile;
pub mod vad;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unsupported sample format for this filter")]
    NotSupported,
}

/// Emitted by filters that observe rather than transform (dtmf, vad).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEvent {
    DtmfPressed(char),
    DtmfReleased(char),
    /// `true` == voice active.
    Vad(bool),
}

/// Uniform capability set a filter instance implements; see SPEC_FULL §9
/// "descriptor-callback polymorphism" redesign note. `process` may replace the frame's
/// buffer in place and must keep `format`/`sample_count` consistent with the data it
/// leaves behind.
pub trait Filter: Send {
    fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError>;
}

/// An ordered list of filter instances applied to one direction of one stream.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Runs every filter in chain order, collecting any events they emit.
    pub fn process(&mut self, frame: &mut AudioFrame) -> Result<Vec<FilterEvent>, FilterError> {
        let mut events = Vec::new();
        for filter in &mut self.filters {
            if let Some(event) = filter.process(frame)? {
                events.push(event);
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device::SampleFormat;

    struct DoublingFilter;

    impl Filter for DoublingFilter {
        fn process(&mut self, frame: &mut AudioFrame) -> Result<Option<FilterEvent>, FilterError> {
            let samples: Vec<i16> = frame
                .as_s16le()
                .into_iter()
                .map(|s| s.saturating_mul(2))
                .collect();
            *frame = AudioFrame::from_s16le(
                &samples,
                frame.sample_rate,
                frame.channels,
                frame.capture_timestamp_us,
            );
            Ok(None)
        }
    }

    #[test]
    fn chain_runs_filters_in_order() {
        let mut chain = FilterChain::new();
        chain.push(Box::new(DoublingFilter));
        chain.push(Box::new(DoublingFilter));

        let mut frame = AudioFrame::from_s16le(&[1, 2, 3], 8000, 1, 0);
        let _ = chain.process(&mut frame).unwrap();
        let _ = frame.format == SampleFormat::S16Le;
        assert_eq!(frame.as_s16le(), vec![4, 8, 12]);
    }
}
