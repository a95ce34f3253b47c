use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while1;
use nom::character::complete::digit1;
use nom::combinator::{map, map_res};
use nom::sequence::preceded;
use std::fmt;
use std::str::FromStr;

/// `a=fmtp` attribute value
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-6.10)
#[derive(Debug, Clone)]
pub struct Fmtp {
    /// The format this entry applies to, must match a payload type number of the media description
    pub format: u32,

    /// Format specific parameters
    pub params: BytesStr,
}

impl Fmtp {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            nom::sequence::pair(
                map_res(digit1, FromStr::from_str),
                preceded(
                    nom::character::complete::char(' '),
                    map(take_while1(|c: char| !matches!(c, '\r' | '\n')), |m| {
                        BytesStr::from_parse(src, m)
                    }),
                ),
            ),
            |(format, params)| Fmtp { format, params },
        )(i)
    }
}

impl fmt::Display for Fmtp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.format, self.params)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fmtp() {
        let input = BytesStr::from_static("101 0-15");

        let (rem, fmtp) = Fmtp::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(fmtp.format, 101);
        assert_eq!(fmtp.params, "0-15");
    }

    #[test]
    fn fmtp_print() {
        let fmtp = Fmtp {
            format: 101,
            params: "0-15".into(),
        };

        assert_eq!(fmtp.to_string(), "101 0-15");
    }
}
