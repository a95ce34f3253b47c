// Generates a `FromStr` impl for types that implement `crate::parse::Parse`.
macro_rules! impl_from_str {
    ($ty:ty) => {
        impl std::str::FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let input = bytesstr::BytesStr::from(s);

                let (rem, parsed) = <$ty as $crate::parse::Parse>::parse(input.as_ref())(&input)
                    .map_err(|e| {
                        anyhow::anyhow!("failed to parse {}: {:?}", stringify!($ty), e)
                    })?;

                if !rem.is_empty() {
                    anyhow::bail!(
                        "unexpected trailing input after {}: {:?}",
                        stringify!($ty),
                        rem
                    );
                }

                Ok(parsed)
            }
        }
    };
}

macro_rules! encode_set {
    ($fn:ident, $name:ident) => {
        lazy_static::lazy_static! {
            static ref $name: AsciiSet = {
                let mut set = percent_encoding::CONTROLS.add(0);

                for b in 0..=127u8 {
                    if !$fn(b as char) {
                        set = set.add(b);
                    }
                }

                set
            };
        }
    };
}
