//! Payload-type negotiation: static types bind by number, everything else binds
//! dynamically in the 96..127 range in registration order, per SPEC_FULL §4.3.

use crate::CodecDescriptor;

pub const DYNAMIC_PT_RANGE: std::ops::RangeInclusive<u8> = 96..=127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedPayloadType {
    pub pt: u8,
    pub codec_index: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum NegotiateError {
    #[error("no free dynamic payload type in 96..127 for {0} codecs")]
    ExhaustedDynamicRange(usize),
}

/// Assigns a payload type to each descriptor in `codecs`, in order. Descriptors with a
/// `static_pt` always get that number; the rest are assigned the next free dynamic
/// number starting at 96, in the order they appear in `codecs`.
pub fn assign_payload_types(
    codecs: &[&CodecDescriptor],
) -> Result<Vec<AssignedPayloadType>, NegotiateError> {
    let mut next_dynamic = *DYNAMIC_PT_RANGE.start();
    let mut out = Vec::with_capacity(codecs.len());

    for (index, codec) in codecs.iter().enumerate() {
        let pt = match codec.static_pt {
            Some(pt) => pt,
            None => {
                if next_dynamic > *DYNAMIC_PT_RANGE.end() {
                    return Err(NegotiateError::ExhaustedDynamicRange(codecs.len()));
                }
                let pt = next_dynamic;
                next_dynamic += 1;
                pt
            }
        };
        out.push(AssignedPayloadType {
            pt,
            codec_index: index,
        });
    }

    Ok(out)
}

/// Intersects an offer's codec-name order with the local preference list, preserving
/// the offerer's order, per SPEC_FULL §4.9 "answer-side preserving the offerer's order".
pub fn intersect_preserving_offer_order<'a>(
    offered_names: &[&str],
    local_names: &[&'a str],
) -> Vec<&'a str> {
    offered_names
        .iter()
        .filter_map(|offered| {
            local_names
                .iter()
                .find(|local| local.eq_ignore_ascii_case(offered))
                .copied()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_codecs;

    #[test]
    fn static_codecs_keep_their_numbers() {
        let codecs = builtin_codecs();
        let refs: Vec<&CodecDescriptor> = codecs.iter().collect();
        let assigned = assign_payload_types(&refs).unwrap();
        assert_eq!(assigned[0].pt, 0); // PCMU
        assert_eq!(assigned[1].pt, 8); // PCMA
        assert_eq!(assigned[2].pt, 9); // G722
    }

    #[test]
    fn intersection_preserves_offer_order() {
        let offered = ["G722", "PCMA", "PCMU"];
        let local = ["PCMU", "PCMA", "G722"];
        let result = intersect_preserving_offer_order(&offered, &local);
        assert_eq!(result, vec!["G722", "PCMA", "PCMU"]);
    }
}
