//! The `Source` contract (spec.md §4.2, §6) and a minimal in-memory
//! reference implementation.
//!
//! `Source` is deliberately the only interface the rest of this crate
//! consumes. Concrete byte sources (files, stdin, caller-defined streaming
//! readers) are external collaborators, per spec.md §1's scope — this
//! crate does not construct them. The one exception is [`SliceSource`]: a
//! reader with no testable way to exercise its own pipeline is not much of
//! a reader, so this crate keeps the one reference, in-memory-buffer
//! implementation its own test suite needs (mirroring the teacher's
//! `SourceBuffer`, which is exactly this kind of "the standalone crate also
//! owns the one buffer-backed reference implementation" artifact).

use crate::ErrorKind;

/// Outcome of a single [`Source::read_byte`] call.
///
/// spec.md §6 describes this contract in terms of a C-shaped integer
/// return (`0..=255` for a byte, `-2` for EOF, `-1` for an I/O error, with
/// any other negative value coerced to `-1`). This enum is the Rust
/// translation: because `Byte` only ever holds a `u8`, the "coerce any
/// other out-of-range value to an I/O error" rule from the original
/// contract is enforced by the type system rather than by each
/// implementation — there is no representable value to coerce.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadByte {
    /// A byte in `[0, 255]` was read.
    Byte(u8),
    /// End of file.
    Eof,
    /// The underlying source failed.
    IoErr,
}

/// A pull-based byte source with byte counting and optional rewind.
///
/// # Terminal latching
///
/// Once [`read_byte`](Source::read_byte) returns [`ReadByte::Eof`] or
/// [`ReadByte::IoErr`], every subsequent call (absent a [`rewind`]
/// (Source::rewind)) must return the same sentinel.
///
/// # Ownership
///
/// Implementations are owned by the caller and borrowed by the read
/// pipeline for the duration of one parse (spec.md §5). The pipeline never
/// closes the underlying resource.
pub trait Source {
    /// Reads the next byte, or a terminal sentinel.
    fn read_byte(&mut self) -> ReadByte;

    /// Number of bytes read so far, excluding the terminal sentinel.
    ///
    /// Saturates rather than overflowing; a caller observing the maximum
    /// value should treat it as "count unknown" rather than exact. Reset to
    /// zero by [`rewind`](Source::rewind).
    fn byte_count(&self) -> u64;

    /// Reads to the end of the source, verifying everything remaining is
    /// one of `{SP, HT, CR, LF}`.
    ///
    /// Returns `Ok(())` once EOF is reached with only blank bytes consumed,
    /// or `Err(ErrorKind::Trailer)` on the first non-blank byte, or
    /// `Err(ErrorKind::IoErr)` on an I/O failure.
    ///
    /// # Contract
    ///
    /// Must not be called mid-parse — only once a parse has completed
    /// (reached `Eof` or an error), to check that nothing but whitespace
    /// follows the `|;` sentinel.
    fn consume_trailing_blank(&mut self) -> Result<(), ErrorKind>;

    /// Returns `true` if this source supports [`rewind`](Source::rewind).
    fn is_multipass(&self) -> bool;

    /// Resets the source to its initial position and zeroes
    /// [`byte_count`](Source::byte_count).
    ///
    /// # Errors
    ///
    /// Returns `Err(ErrorKind::IoErr)` if rewinding fails.
    ///
    /// # Contract
    ///
    /// Calling this when [`is_multipass`](Source::is_multipass) is `false`
    /// is a caller contract violation (spec.md §7: "a fault, not an
    /// error") — implementations may panic in that case rather than
    /// returning `Err`.
    fn rewind(&mut self) -> Result<(), ErrorKind>;
}

const BLANK: [u8; 4] = [b' ', b'\t', b'\r', b'\n'];

/// A [`Source`] over an in-memory byte slice.
///
/// Always multipass. Intended for tests and for callers who already have
/// the whole document in memory and don't want to write their own
/// `Source` adapter for that common case.
#[derive(Clone, Debug)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: usize,
    byte_count: u64,
    terminal: Option<ReadByte>,
}

impl<'a> SliceSource<'a> {
    /// Creates a new source reading from `bytes`, starting at the front.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            byte_count: 0,
            terminal: None,
        }
    }
}

impl Source for SliceSource<'_> {
    fn read_byte(&mut self) -> ReadByte {
        if let Some(terminal) = self.terminal {
            return terminal;
        }
        match self.bytes.get(self.pos) {
            Some(&byte) => {
                self.pos += 1;
                self.byte_count = self.byte_count.saturating_add(1);
                ReadByte::Byte(byte)
            }
            None => {
                self.terminal = Some(ReadByte::Eof);
                ReadByte::Eof
            }
        }
    }

    fn byte_count(&self) -> u64 {
        self.byte_count
    }

    fn consume_trailing_blank(&mut self) -> Result<(), ErrorKind> {
        let remaining = &self.bytes[self.pos..];
        match remaining.iter().position(|b| !BLANK.contains(b)) {
            Some(offset) => {
                let consumed = offset + 1;
                self.pos += consumed;
                self.byte_count = self.byte_count.saturating_add(consumed as u64);
                Err(ErrorKind::Trailer)
            }
            None => {
                let consumed = remaining.len();
                self.pos += consumed;
                self.byte_count = self.byte_count.saturating_add(consumed as u64);
                self.terminal = Some(ReadByte::Eof);
                Ok(())
            }
        }
    }

    fn is_multipass(&self) -> bool {
        true
    }

    fn rewind(&mut self) -> Result<(), ErrorKind> {
        self.pos = 0;
        self.byte_count = 0;
        self.terminal = None;
        Ok(())
    }
}
