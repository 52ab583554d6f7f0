//! Tokenizer and entity-synthesizing parser for the Shastina reader.
//!
//! Built on top of `shastina_core`'s byte-to-codepoint layer. A
//! [`Parser`] is the whole public surface most callers need: feed it a
//! [`shastina_core::Source`], pull [`Entity`](entity::Entity) values
//! until `Eof` or `Error`.

pub mod entity;
pub mod limits;
pub mod parser;
pub mod token;
pub mod tokenizer;

pub use entity::Entity;
pub use limits::Limits;
pub use parser::Parser;
pub use token::{Quoting, Token};
pub use tokenizer::Tokenizer;
