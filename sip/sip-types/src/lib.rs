#![forbid(unsafe_code)]

#[macro_use]
mod macros;
#[macro_use]
pub mod print;
#[macro_use]
pub mod uri;
mod code;
pub mod header;
pub mod host;
mod method;
pub mod msg;
pub mod parse;

pub use code::{CodeKind, StatusCode};
pub use method::Method;

pub use header::headers::Headers;
pub use header::name::Name;

/// Re-exports used by the `csv_header!` / `from_str_header!` macros so callers
/// don't need to depend on `bytes`, `internal` or `nom` themselves.
#[doc(hidden)]
pub mod _private_reexport {
    pub use bytes::Bytes;
    pub use internal::{identity, IResult};
    pub use nom;
}
