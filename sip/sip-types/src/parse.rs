#![allow(unused_parens)]
//! Parsing utilities for SIP message components

use bytes::Bytes;
use internal::IResult;
use nom::bytes::complete::{escaped, is_not};
use nom::character::complete::char;
use nom::sequence::delimited;

pub(crate) fn parse_quoted(i: &str) -> IResult<&str, &str> {
    delimited(char('"'), escaped(is_not("\""), '\\', char('"')), char('"'))(i)
}

pub(crate) fn whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

#[rustfmt::skip]
pub(crate) fn token(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '.' | '!' | '%' | '*' | '_' | '`' | '\'' | '~' | '+')
}

/// Parse a type out of a nom-style parser that also has access to the message's
/// source buffer, so parsed sub-slices can be turned into zero-copy [`BytesStr`](bytesstr::BytesStr)s.
pub trait Parse: Sized {
    fn parse(src: &Bytes) -> impl Fn(&str) -> IResult<&str, Self> + '_;
}
