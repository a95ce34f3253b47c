use crate::not_whitespace;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while;
use nom::combinator::map;
use nom::multi::many0;
use nom::sequence::preceded;
use std::fmt;

/// `a=group` attribute value
///
/// [RFC5888](https://www.rfc-editor.org/rfc/rfc5888.html)
#[derive(Debug, Clone)]
pub struct Group {
    /// The semantic of the grouping, e.g. `LS` (lip-sync) or `BUNDLE`
    pub typ: BytesStr,

    /// The media identifiers of the media descriptions that are part of this group
    pub mids: Vec<BytesStr>,
}

impl Group {
    pub fn parse<'i>(src: &Bytes, i: &'i str) -> IResult<&'i str, Self> {
        map(
            nom::sequence::tuple((
                map(take_while(not_whitespace), |m| BytesStr::from_parse(src, m)),
                many0(preceded(
                    take_while(char::is_whitespace),
                    map(take_while(not_whitespace), |m| BytesStr::from_parse(src, m)),
                )),
            )),
            |(typ, mids)| Group { typ, mids },
        )(i)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.typ)?;

        for mid in &self.mids {
            write!(f, " {}", mid)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn group() {
        let input = BytesStr::from_static("BUNDLE audio video");

        let (rem, group) = Group::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());

        assert_eq!(group.typ, "BUNDLE");
        assert_eq!(group.mids, ["audio", "video"]);
    }

    #[test]
    fn group_print() {
        let group = Group {
            typ: "BUNDLE".into(),
            mids: vec!["audio".into(), "video".into()],
        };

        assert_eq!(group.to_string(), "BUNDLE audio video");
    }
}
