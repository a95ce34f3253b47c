//! Codec descriptor registry (component C2).
//!
//! Mirrors the capability-set redesign called for by the module-loader rework: a
//! [`CodecDescriptor`] is a named, shared-immutable value that knows how to build a
//! fresh per-stream [`AudioCodec`] instance; the registry itself is populated once and
//! read thereafter (see `core/registry`).

use std::fmt;

use thiserror::Error;

pub mod negotiate;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("sample count {got} is not a multiple of the codec frame size {expected}")]
    ProtocolViolation { expected: usize, got: usize },
    #[error("operation not supported by this codec")]
    NotSupported,
}

/// A per-stream codec instance. Created fresh per direction per stream by
/// [`CodecDescriptor::new_instance`]; never shared across streams.
pub trait AudioCodec: Send {
    /// Encode linear PCM16 samples (exactly one or more whole codec frames) to wire bytes.
    fn encode_frame(&mut self, samples: &[i16]) -> Result<Vec<u8>, CodecError>;

    /// Decode wire bytes back to linear PCM16 samples.
    fn decode_frame(&mut self, data: &[u8]) -> Result<Vec<i16>, CodecError>;

    /// Synthesize `count` samples of packet-loss concealment. Default: silence: most
    /// codecs in this workspace delegate real concealment to the `plc` filter instead.
    fn plc(&mut self, count: usize) -> Vec<i16> {
        vec![0; count]
    }

    /// Emit `a=fmtp:` payload bytes for SDP. Default: no fmtp line.
    fn fmtp_encode(&self) -> Option<String> {
        None
    }
}

/// Shared-immutable description of a codec, held by the registry for the lifetime of
/// the process.
#[derive(Clone, Copy)]
pub struct CodecDescriptor {
    pub name: &'static str,
    /// RTP clock rate (RFC 3551); for G722 this is 8000 even though samples run at 16000.
    pub clock_rate: u32,
    pub sample_rate: u32,
    pub channels: u8,
    /// `Some(pt)` for the statically assigned payload types; `None` means it must be
    /// negotiated dynamically in the 96..127 range.
    pub static_pt: Option<u8>,
    new_instance: fn() -> Box<dyn AudioCodec>,
}

impl fmt::Debug for CodecDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecDescriptor")
            .field("name", &self.name)
            .field("clock_rate", &self.clock_rate)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("static_pt", &self.static_pt)
            .finish()
    }
}

impl CodecDescriptor {
    pub fn new_instance(&self) -> Box<dyn AudioCodec> {
        (self.new_instance)()
    }
}

struct Pcmu;

impl AudioCodec for Pcmu {
    fn encode_frame(&mut self, samples: &[i16]) -> Result<Vec<u8>, CodecError> {
        Ok(samples.iter().copied().map(g711::mulaw::encode).collect())
    }

    fn decode_frame(&mut self, data: &[u8]) -> Result<Vec<i16>, CodecError> {
        Ok(data.iter().copied().map(g711::mulaw::decode).collect())
    }
}

struct Pcma;

impl AudioCodec for Pcma {
    fn encode_frame(&mut self, samples: &[i16]) -> Result<Vec<u8>, CodecError> {
        Ok(samples.iter().copied().map(g711::alaw::encode).collect())
    }

    fn decode_frame(&mut self, data: &[u8]) -> Result<Vec<i16>, CodecError> {
        Ok(data.iter().copied().map(g711::alaw::decode).collect())
    }
}

/// G722 operates at a 16 kHz sample rate but RFC 3551 pins the RTP clock rate at 8000;
/// see the Open Questions decision recorded in DESIGN.md.
struct G722 {
    encoder: g722::G722Encoder,
    decoder: g722::G722Decoder,
}

impl AudioCodec for G722 {
    fn encode_frame(&mut self, samples: &[i16]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(samples.len() / 2);
        self.encoder.encode(samples, &mut out);
        Ok(out)
    }

    fn decode_frame(&mut self, data: &[u8]) -> Result<Vec<i16>, CodecError> {
        let mut out = Vec::with_capacity(data.len() * 2);
        self.decoder.decode(data, &mut out);
        Ok(out)
    }
}

/// Static payload-type table (RFC 3551 §6), as referenced by SPEC_FULL §4.3.
pub const PT_PCMU: u8 = 0;
pub const PT_GSM: u8 = 3;
pub const PT_PCMA: u8 = 8;
pub const PT_G722: u8 = 9;
pub const PT_L16_STEREO: u8 = 10;
pub const PT_L16_MONO: u8 = 11;

/// Builds the set of codec descriptors this workspace ships. GSM/L16 payload-type
/// numbers are reserved (see SPEC_FULL §4.3) but no descriptor is registered for them:
/// no DSP crate for either exists in the corpus.
pub fn builtin_codecs() -> Vec<CodecDescriptor> {
    vec![
        CodecDescriptor {
            name: "PCMU",
            clock_rate: 8000,
            sample_rate: 8000,
            channels: 1,
            static_pt: Some(PT_PCMU),
            new_instance: || Box::new(Pcmu),
        },
        CodecDescriptor {
            name: "PCMA",
            clock_rate: 8000,
            sample_rate: 8000,
            channels: 1,
            static_pt: Some(PT_PCMA),
            new_instance: || Box::new(Pcma),
        },
        CodecDescriptor {
            name: "G722",
            clock_rate: 8000,
            sample_rate: 16000,
            channels: 1,
            static_pt: Some(PT_G722),
            new_instance: || {
                Box::new(G722 {
                    encoder: g722::G722Encoder::new(),
                    decoder: g722::G722Decoder::new(),
                })
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcmu_round_trips_within_quantization_error() {
        let mut codec = Pcmu;
        let samples: Vec<i16> = (0..160).map(|i| (i * 100) as i16).collect();
        let encoded = codec.encode_frame(&samples).unwrap();
        assert_eq!(encoded.len(), samples.len());
        let decoded = codec.decode_frame(&encoded).unwrap();
        assert_eq!(decoded.len(), samples.len());
    }

    #[test]
    fn g722_halves_byte_count() {
        let mut codec = G722 {
            encoder: g722::G722Encoder::new(),
            decoder: g722::G722Decoder::new(),
        };
        let samples = [0i16; 320];
        let encoded = codec.encode_frame(&samples).unwrap();
        assert_eq!(encoded.len(), 160);
    }

    #[test]
    fn builtin_codecs_have_the_expected_static_payload_types() {
        let codecs = builtin_codecs();
        let pcmu = codecs.iter().find(|c| c.name == "PCMU").unwrap();
        assert_eq!(pcmu.static_pt, Some(0));
        let g722 = codecs.iter().find(|c| c.name == "G722").unwrap();
        assert_eq!(g722.clock_rate, 8000);
        assert_eq!(g722.sample_rate, 16000);
    }
}
