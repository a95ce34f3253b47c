//! Support for headers that can occur more than once in a message, either as
//! repeated header lines or as a single comma-separated value.

use crate::header::headers::OneOrMore;
use crate::header::typed::{Accept, Allow, Contact, Require, Routing, Supported, Via};
use crate::header::{ConstNamed, DecodeValues, ExtendValues, HeaderParse};
use crate::parse::whitespace;
use crate::print::PrintCtx;
use crate::Name;
use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::error::{VerboseError, VerboseErrorKind};

fn decode_multiple<'i, H, I>(values: &mut I) -> IResult<&'i str, Vec<H>>
where
    H: HeaderParse,
    I: Iterator<Item = &'i BytesStr>,
{
    let mut vec = Vec::new();

    for value in values {
        let src: &Bytes = value.as_ref();
        let mut i: &str = value.as_str();

        loop {
            match H::parse(src, i) {
                Ok((rem, header)) => {
                    vec.push(header);

                    let rem = rem.trim_start_matches(whitespace);

                    if let Some(rem) = rem.strip_prefix(',') {
                        i = rem.trim_start_matches(whitespace);
                    } else {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }

    if vec.is_empty() {
        Err(nom::Err::Failure(VerboseError {
            errors: vec![("", VerboseErrorKind::Context("no values to decode"))],
        }))
    } else {
        Ok(("", vec))
    }
}

fn create_multiple_values<H: ExtendValues>(headers: &[H], ctx: PrintCtx<'_>) -> OneOrMore {
    let mut value = String::new();

    for (index, header) in headers.iter().enumerate() {
        if index > 0 {
            value.push_str(", ");
        }

        match header.create_values(ctx) {
            OneOrMore::One(v) => value.push_str(&v),
            OneOrMore::More(values) => {
                let len = values.len();

                for (value_index, v) in values.into_iter().enumerate() {
                    value.push_str(&v);

                    if value_index + 1 < len {
                        value.push_str(", ");
                    }
                }
            }
        }
    }

    OneOrMore::One(value.into())
}

macro_rules! multi_header {
    ($ty:ty) => {
        impl DecodeValues for Vec<$ty> {
            fn decode<'i, I>(values: &mut I) -> IResult<&'i str, Self>
            where
                I: Iterator<Item = &'i BytesStr>,
            {
                decode_multiple(values)
            }
        }

        impl ExtendValues for Vec<$ty> {
            fn extend_values(&self, ctx: PrintCtx<'_>, values: &mut OneOrMore) {
                *values = self.create_values(ctx);
            }

            fn create_values(&self, ctx: PrintCtx<'_>) -> OneOrMore {
                create_multiple_values(self, ctx)
            }
        }
    };
}

macro_rules! multi_named_header {
    ($ty:ty) => {
        multi_header!($ty);

        impl ConstNamed for Vec<$ty> {
            const NAME: Name = <$ty as ConstNamed>::NAME;
        }
    };
}

multi_header!(Routing);

multi_named_header!(Via);
multi_named_header!(Supported);
multi_named_header!(Require);
multi_named_header!(Allow);
multi_named_header!(Accept);
multi_named_header!(Contact);

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::typed::MaxForwards;
    use crate::Headers;

    multi_named_header!(MaxForwards);

    #[test]
    fn multiple_csv_parse() {
        let mut headers = Headers::new();
        headers.insert(Name::MAX_FORWARDS, "1, 2, 3");

        let values: Vec<MaxForwards> = headers.get_named().unwrap();

        assert_eq!(values[0].0, 1);
        assert_eq!(values[1].0, 2);
        assert_eq!(values[2].0, 3);
    }

    #[test]
    fn multiple_repeated_lines_parse() {
        let mut headers = Headers::new();
        headers.insert(Name::MAX_FORWARDS, "1");
        headers.insert(Name::MAX_FORWARDS, "2");

        let values: Vec<MaxForwards> = headers.get_named().unwrap();

        assert_eq!(values[0].0, 1);
        assert_eq!(values[1].0, 2);
    }

    #[test]
    fn multiple_print() {
        let mut headers = Headers::new();

        headers.insert_named(&vec![MaxForwards(1), MaxForwards(2)]);

        assert_eq!(headers.to_string(), "Max-Forwards: 1, 2\r\n");
    }
}
