use crate::header::name::Name;
use bytesstr::BytesStr;

csv_header! {
    /// `Supported` header, contains only one supported extension.
    /// To get all supported extension use [`Vec`].
    Supported,
    BytesStr,
    Name::SUPPORTED
}

csv_header! {
    /// `Require` header, contains only one required extension.
    /// To get all required extension use [`Vec`].
    Require,
    BytesStr,
    Name::REQUIRE
}

csv_header! {
    /// `Unsupported` header, contains only one unsupported extension.
    /// To get all unsupported extension use [`Vec`].
    Unsupported,
    BytesStr,
    Name::UNSUPPORTED
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Headers;

    #[test]
    fn parse_supported_multiple() {
        let mut headers = Headers::new();
        headers.insert(Name::SUPPORTED, "100rel, timer");

        let supported: Vec<Supported> = headers.get_named().unwrap();
        assert_eq!(
            supported,
            vec![
                Supported(BytesStr::from_static("100rel")),
                Supported(BytesStr::from_static("timer"))
            ]
        );
    }

    #[test]
    fn print_require() {
        let mut headers = Headers::new();
        headers.insert_named(&Require(BytesStr::from_static("100rel")));
        assert_eq!(headers.to_string(), "Require: 100rel\r\n");
    }
}
