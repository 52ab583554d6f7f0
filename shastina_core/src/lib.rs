//! Standalone byte-to-codepoint layer for the Shastina reader.
//!
//! This crate has exactly one public-facing idea: `Source` bytes go in,
//! normalized codepoints come out. It knows nothing about tokens, arrays,
//! or metacommands — that lives one layer up, in `shastina`.

pub mod codec;
pub mod error;
pub mod filter;
pub mod source;

pub use error::ErrorKind;
pub use filter::{Code, Filter};
pub use source::{ReadByte, Source, SliceSource};
