use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::digit1;
use nom::combinator::{map, map_res, opt};
use nom::error::context;
use nom::sequence::preceded;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

use crate::ice_char;

#[derive(Debug, Error)]
#[error("invalid candidate parameter")]
pub struct InvalidCandidateParamError;

/// Candidate transport protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateTransport {
    Udp,
    Tcp,
}

impl fmt::Display for CandidateTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CandidateTransport::Udp => f.write_str("udp"),
            CandidateTransport::Tcp => f.write_str("tcp"),
        }
    }
}

/// Candidate type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateType {
    Host,
    ServerReflexive,
    PeerReflexive,
    Relayed,
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CandidateType::Host => f.write_str("host"),
            CandidateType::ServerReflexive => f.write_str("srflx"),
            CandidateType::PeerReflexive => f.write_str("prflx"),
            CandidateType::Relayed => f.write_str("relay"),
        }
    }
}

/// An address that may be an IP-address or a fully qualified domain name
#[derive(Debug, Clone)]
pub enum UntaggedAddress {
    IpAddress(IpAddr),
    Fqdn(BytesStr),
}

impl fmt::Display for UntaggedAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UntaggedAddress::IpAddress(addr) => write!(f, "{}", addr),
            UntaggedAddress::Fqdn(fqdn) => write!(f, "{}", fqdn),
        }
    }
}

impl From<IpAddr> for UntaggedAddress {
    fn from(addr: IpAddr) -> Self {
        UntaggedAddress::IpAddress(addr)
    }
}

/// ICE candidate, `a=candidate` attribute value
///
/// [RFC8839](https://www.rfc-editor.org/rfc/rfc8839.html#section-5.1)
#[derive(Debug, Clone)]
pub struct IceCandidate {
    pub foundation: BytesStr,
    pub component: u32,
    pub transport: CandidateTransport,
    pub priority: u32,
    pub address: UntaggedAddress,
    pub port: u16,
    pub typ: CandidateType,
    pub rel_addr: Option<UntaggedAddress>,
    pub rel_port: Option<u16>,
    pub unknown_extensions: Vec<(BytesStr, BytesStr)>,
}

impl IceCandidate {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        context("parsing candidate", move |i| parse_candidate(src, i))(i)
    }
}

fn parse_candidate<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, IceCandidate> {
    let (i, foundation) = map(take_while1(ice_char), |m| BytesStr::from_parse(src, m))(i)?;
    let (i, _) = tag(" ")(i)?;
    let (i, component) = map_res(digit1, FromStr::from_str)(i)?;
    let (i, _) = tag(" ")(i)?;
    let (i, transport) = alt((
        map(tag("udp"), |_| CandidateTransport::Udp),
        map(tag("UDP"), |_| CandidateTransport::Udp),
        map(tag("tcp"), |_| CandidateTransport::Tcp),
        map(tag("TCP"), |_| CandidateTransport::Tcp),
    ))(i)?;
    let (i, _) = tag(" ")(i)?;
    let (i, priority) = map_res(digit1, FromStr::from_str)(i)?;
    let (i, _) = tag(" ")(i)?;
    let (i, address) = untagged_address(src)(i)?;
    let (i, _) = tag(" ")(i)?;
    let (i, port) = map_res(digit1, FromStr::from_str)(i)?;
    let (i, _) = tag(" typ ")(i)?;
    let (i, typ) = alt((
        map(tag("host"), |_| CandidateType::Host),
        map(tag("srflx"), |_| CandidateType::ServerReflexive),
        map(tag("prflx"), |_| CandidateType::PeerReflexive),
        map(tag("relay"), |_| CandidateType::Relayed),
    ))(i)?;

    let (i, rel_addr) = opt(preceded(tag(" raddr "), untagged_address(src)))(i)?;
    let (i, rel_port) = opt(preceded(
        tag(" rport "),
        map_res(digit1, FromStr::from_str),
    ))(i)?;

    let (i, unknown_extensions) = nom::multi::many0(preceded(
        tag(" "),
        nom::sequence::separated_pair(
            map(take_while1(ice_char), |m| BytesStr::from_parse(src, m)),
            tag(" "),
            map(take_while(|c: char| !c.is_whitespace()), |m| {
                BytesStr::from_parse(src, m)
            }),
        ),
    ))(i)?;

    Ok((
        i,
        IceCandidate {
            foundation,
            component,
            transport,
            priority,
            address,
            port,
            typ,
            rel_addr,
            rel_port,
            unknown_extensions,
        },
    ))
}

fn untagged_address(src: &Bytes) -> impl Fn(&str) -> IResult<&str, UntaggedAddress> + '_ {
    move |i| {
        map(take_while1(|c: char| !c.is_whitespace()), |m: &str| {
            if let Ok(ip) = Ipv4Addr::from_str(m) {
                UntaggedAddress::IpAddress(IpAddr::V4(ip))
            } else if let Ok(ip) = Ipv6Addr::from_str(m) {
                UntaggedAddress::IpAddress(IpAddr::V6(ip))
            } else {
                UntaggedAddress::Fqdn(BytesStr::from_parse(src, m))
            }
        })(i)
    }
}

impl fmt::Display for IceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.transport,
            self.priority,
            self.address,
            self.port,
            self.typ
        )?;

        if let Some(rel_addr) = &self.rel_addr {
            write!(f, " raddr {}", rel_addr)?;
        }

        if let Some(rel_port) = &self.rel_port {
            write!(f, " rport {}", rel_port)?;
        }

        for (name, value) in &self.unknown_extensions {
            write!(f, " {} {}", name, value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn candidate_host() {
        let input =
            BytesStr::from_static("1853887674 1 udp 1518280447 192.0.2.33 10000 typ host");

        let (rem, candidate) = IceCandidate::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(candidate.foundation, "1853887674");
        assert_eq!(candidate.component, 1);
        assert_eq!(candidate.transport, CandidateTransport::Udp);
        assert_eq!(candidate.priority, 1518280447);
        assert_eq!(candidate.port, 10000);
        assert_eq!(candidate.typ, CandidateType::Host);
        assert!(candidate.rel_addr.is_none());
        assert!(candidate.rel_port.is_none());
    }

    #[test]
    fn candidate_srflx() {
        let input = BytesStr::from_static(
            "1853887675 1 udp 1518280446 24.23.204.141 54609 typ srflx raddr 192.0.2.33 rport 10000",
        );

        let (rem, candidate) = IceCandidate::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(candidate.typ, CandidateType::ServerReflexive);
        assert!(candidate.rel_addr.is_some());
        assert_eq!(candidate.rel_port, Some(10000));
    }

    #[test]
    fn candidate_print() {
        let candidate = IceCandidate {
            foundation: "1853887674".into(),
            component: 1,
            transport: CandidateTransport::Udp,
            priority: 1518280447,
            address: UntaggedAddress::IpAddress(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 33))),
            port: 10000,
            typ: CandidateType::Host,
            rel_addr: None,
            rel_port: None,
            unknown_extensions: vec![],
        };

        assert_eq!(
            candidate.to_string(),
            "1853887674 1 udp 1518280447 192.0.2.33 10000 typ host"
        );
    }
}
