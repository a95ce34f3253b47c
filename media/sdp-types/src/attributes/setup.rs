use bytes::Bytes;
use internal::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::map;
use std::fmt;

/// `a=setup` attribute value
///
/// [RFC4145](https://www.rfc-editor.org/rfc/rfc4145.html#section-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setup {
    Active,
    Passive,
    ActPass,
    HoldConn,
}

impl Setup {
    pub fn as_str(self) -> &'static str {
        match self {
            Setup::Active => "active",
            Setup::Passive => "passive",
            Setup::ActPass => "actpass",
            Setup::HoldConn => "holdconn",
        }
    }

    pub fn parse<'i>(_src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        alt((
            map(tag("active"), |_| Setup::Active),
            map(tag("passive"), |_| Setup::Passive),
            map(tag("actpass"), |_| Setup::ActPass),
            map(tag("holdconn"), |_| Setup::HoldConn),
        ))(i)
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytesstr::BytesStr;

    #[test]
    fn setup() {
        let input = BytesStr::from_static("actpass");

        let (rem, setup) = Setup::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(setup, Setup::ActPass);
    }

    #[test]
    fn setup_print() {
        assert_eq!(Setup::Active.to_string(), "active");
        assert_eq!(Setup::Passive.to_string(), "passive");
        assert_eq!(Setup::ActPass.to_string(), "actpass");
        assert_eq!(Setup::HoldConn.to_string(), "holdconn");
    }
}
