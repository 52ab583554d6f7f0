//! The flat error taxonomy shared by every layer of the reader.
//!
//! A single `ErrorKind` currency is threaded through `Filter`, `Tokenizer`,
//! and `Parser`. Once any layer yields one, the stream is permanently in
//! that error state (spec.md §7) — there is nothing to recover from, so
//! `ErrorKind` carries no payload beyond which condition occurred.

use std::fmt;

/// A single point of failure in the read pipeline.
///
/// Distinct values, one per condition in spec.md §3. `#[non_exhaustive]`
/// so a future revision can add a kind without breaking downstream
/// exhaustive matches — callers should default to `message()` for display
/// rather than matching on every variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The underlying `Source` reported an I/O failure.
    IoErr,
    /// End of file reached where more input was required.
    Eof,
    /// A `CR` byte was not immediately followed by `LF`.
    BadCr,
    /// A string literal was not closed before end of file.
    OpenStr,
    /// A string literal payload exceeded the configured length limit.
    LongStr,
    /// A null codepoint (`U+0000`) appeared inside a string payload.
    NullChr,
    /// Curly-string nesting exceeded the configured depth limit.
    DeepCurly,
    /// A codepoint outside the legal character set appeared outside a string.
    BadChar,
    /// A plain token exceeded the configured length limit.
    LongToken,
    /// Trailing input after `|;` was not whitespace-only.
    Trailer,
    /// Array nesting exceeded the configured stack depth.
    DeepArray,
    /// `%` was seen while already inside a metacommand.
    MetaNest,
    /// `;` was seen while not inside a metacommand.
    Semicolon,
    /// Group nesting within one array/group frame exceeded the configured limit.
    DeepGroup,
    /// `)` was seen with no matching open group.
    RParen,
    /// `]` was seen with no matching open array.
    RSqr,
    /// `,` or `]` was seen with an unbalanced open group in the current frame.
    OpenGroup,
    /// An array accumulated more elements than the configured maximum.
    LongArray,
    /// A surrogate codepoint had no matching partner to reassemble with.
    Unpaired,
    /// `|;` was seen while still inside a metacommand.
    OpenMeta,
    /// `|;` was seen while an array was still open.
    OpenArray,
    /// `,` was seen outside any open array.
    Comma,
    /// The byte stream did not decode as valid UTF-8.
    Utf8,
}

impl ErrorKind {
    /// Fixed, capitalized English message, without terminal punctuation.
    ///
    /// Stable across versions — suitable for diagnostics shown to a user.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::IoErr => "I/O error",
            Self::Eof => "Unexpected end of file",
            Self::BadCr => "Carriage return not followed by line feed",
            Self::OpenStr => "Unterminated string literal",
            Self::LongStr => "String literal too long",
            Self::NullChr => "Null character in string literal",
            Self::DeepCurly => "Curly brace nesting too deep",
            Self::BadChar => "Illegal character",
            Self::LongToken => "Token too long",
            Self::Trailer => "Unexpected data after end of program",
            Self::DeepArray => "Array nesting too deep",
            Self::MetaNest => "Metacommand cannot be nested",
            Self::Semicolon => "Semicolon without open metacommand",
            Self::DeepGroup => "Group nesting too deep",
            Self::RParen => "Right parenthesis without open group",
            Self::RSqr => "Right square bracket without open array",
            Self::OpenGroup => "Group left open",
            Self::LongArray => "Array has too many elements",
            Self::Unpaired => "Unpaired surrogate codepoint",
            Self::OpenMeta => "Metacommand left open at end of program",
            Self::OpenArray => "Array left open at end of program",
            Self::Comma => "Comma outside an array",
            Self::Utf8 => "Invalid UTF-8 encoding",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ErrorKind {}
