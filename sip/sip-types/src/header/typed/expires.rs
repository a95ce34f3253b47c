use crate::Name;

from_str_header! {
    /// `Expires` header, seconds until a registration or subscription expires
    Expires,
    Name::EXPIRES,
    u32
}

from_str_header! {
    /// `Min-Expires` header, sent by a registrar rejecting a too-short `Expires`
    MinExpires,
    Name::MIN_EXPIRES,
    u32
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::HeaderParse;
    use bytesstr::BytesStr;

    #[test]
    fn expires() {
        let input = BytesStr::from_static("300");

        let (rem, expires) = Expires::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(expires.0, 300);
    }

    #[test]
    fn min_expires() {
        let input = BytesStr::from_static("60");

        let (rem, min_expires) = MinExpires::parse(input.as_ref(), &input).unwrap();

        assert!(rem.is_empty());
        assert_eq!(min_expires.0, 60);
    }
}
