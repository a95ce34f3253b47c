use crate::ice_char;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while;
use nom::combinator::map;
use nom::multi::separated_list0;
use std::fmt;

/// `a=ice-options` attribute value
///
/// [RFC8839](https://www.rfc-editor.org/rfc/rfc8839.html#section-5.1.2)
#[derive(Debug, Clone)]
pub struct IceOptions {
    pub options: Vec<BytesStr>,
}

impl IceOptions {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            separated_list0(
                nom::character::complete::char(' '),
                map(take_while(ice_char), |m| BytesStr::from_parse(src, m)),
            ),
            |options| IceOptions { options },
        )(i)
    }
}

impl fmt::Display for IceOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut iter = self.options.iter();

        if let Some(first) = iter.next() {
            write!(f, "{}", first)?;
        }

        for option in iter {
            write!(f, " {}", option)?;
        }

        Ok(())
    }
}

/// `a=ice-ufrag` attribute value
///
/// [RFC8839](https://www.rfc-editor.org/rfc/rfc8839.html#section-5.1.1)
#[derive(Debug, Clone)]
pub struct IceUsernameFragment {
    pub ufrag: BytesStr,
}

impl IceUsernameFragment {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(take_while(ice_char), |m| IceUsernameFragment {
            ufrag: BytesStr::from_parse(src, m),
        })(i)
    }
}

impl fmt::Display for IceUsernameFragment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ufrag)
    }
}

/// `a=ice-pwd` attribute value
///
/// [RFC8839](https://www.rfc-editor.org/rfc/rfc8839.html#section-5.1.1)
#[derive(Debug, Clone)]
pub struct IcePassword {
    pub pwd: BytesStr,
}

impl IcePassword {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(take_while(ice_char), |m| IcePassword {
            pwd: BytesStr::from_parse(src, m),
        })(i)
    }
}

impl fmt::Display for IcePassword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pwd)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ice_options() {
        let input = BytesStr::from_static("trickle renomination");

        let (rem, options) = IceOptions::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(options.options, ["trickle", "renomination"]);
    }

    #[test]
    fn ice_ufrag() {
        let input = BytesStr::from_static("F7gI");

        let (rem, ufrag) = IceUsernameFragment::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(ufrag.ufrag, "F7gI");
    }

    #[test]
    fn ice_pwd() {
        let input = BytesStr::from_static("x9cml/YzichV2+XlhiMu8g");

        let (rem, pwd) = IcePassword::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(pwd.pwd, "x9cml/YzichV2+XlhiMu8g");
    }
}
