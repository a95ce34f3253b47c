use crate::TaggedAddress;
use bytes::Bytes;
use internal::IResult;
use nom::character::complete::digit1;
use nom::combinator::{map_res, opt};
use nom::sequence::preceded;
use std::fmt;
use std::str::FromStr;

/// `a=rtcp` attribute value
///
/// [RFC3605](https://www.rfc-editor.org/rfc/rfc3605.html)
#[derive(Debug, Clone)]
pub struct Rtcp {
    /// The port used for RTCP
    pub port: u16,

    /// The network type, address type and address used for RTCP,
    /// if different from the one given in the media/session connection field
    pub address: Option<TaggedAddress>,
}

impl Rtcp {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        nom::combinator::map(
            nom::sequence::pair(
                map_res(digit1, FromStr::from_str),
                opt(preceded(
                    nom::character::complete::char(' '),
                    TaggedAddress::parse(src),
                )),
            ),
            |(port, address)| Rtcp { port, address },
        )(i)
    }
}

impl fmt::Display for Rtcp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.port)?;

        if let Some(address) = &self.address {
            write!(f, " {}", address)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytesstr::BytesStr;
    use std::net::Ipv4Addr;

    #[test]
    fn rtcp() {
        let input = BytesStr::from_static("53020");

        let (rem, rtcp) = Rtcp::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(rtcp.port, 53020);
        assert!(rtcp.address.is_none());
    }

    #[test]
    fn rtcp_with_address() {
        let input = BytesStr::from_static("53020 IN IP4 126.16.64.4");

        let (rem, rtcp) = Rtcp::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(rtcp.port, 53020);
        assert!(
            matches!(rtcp.address, Some(TaggedAddress::IP4(ip)) if ip == Ipv4Addr::new(126, 16, 64, 4))
        );
    }

    #[test]
    fn rtcp_print() {
        let rtcp = Rtcp {
            port: 53020,
            address: None,
        };

        assert_eq!(rtcp.to_string(), "53020");
    }
}
