//! Byte-to-codepoint filter layer (spec.md §4.3).
//!
//! Wraps a [`Source`] and produces a normalized codepoint stream: BOM
//! suppression, `CR`/`CR+LF`/`LF+CR` normalization to `LF`, surrogate-pair
//! reassembly, final-`LF` enforcement, line counting, and one codepoint of
//! pushback. This is the only layer in the crate that still thinks in
//! bytes; everything above it (`Tokenizer`, `Parser`) only ever sees
//! codepoints.

use crate::codec;
use crate::source::{ReadByte, Source};
use crate::ErrorKind;

const CR: u32 = 0x0D;
const LF: u32 = 0x0A;
const BOM: u32 = 0xFEFF;

/// One codepoint from the filter, or the terminal end-of-stream marker.
///
/// Distinct from `Result<u32, ErrorKind>`'s `Ok`/`Err` split because a
/// successful read and a clean end of stream are both "not an error" —
/// this mirrors `Token`/`Entity` elsewhere in the crate, which also
/// separate "terminal, but not an error" from "terminal because of an
/// error".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Code {
    /// A normalized codepoint. Never a surrogate (`U+D800..=U+DFFF`).
    Value(u32),
    /// Clean end of stream — the synthetic final `LF` (if one was needed)
    /// has already been emitted.
    Eof,
}

/// Byte-to-codepoint filter over a [`Source`].
///
/// # Terminal latching
///
/// Once [`read_code`](Filter::read_code) returns `Ok(Code::Eof)` or any
/// `Err`, every subsequent call returns the identical value (spec.md §3
/// invariant 1). A second [`pushback`](Filter::pushback) without an
/// intervening read is a caller contract violation and panics, per
/// spec.md §4.3 "Pushback": "A second pushback without an intervening
/// read is a fault."
pub struct Filter<S> {
    source: S,
    /// The one codepoint of pushback capacity.
    pushback: Option<u32>,
    /// 1-based, saturating.
    line: u64,
    /// Whether the BOM check still needs to run (only the very first
    /// codepoint of the whole stream is eligible).
    at_start: bool,
    /// Whether the most recently emitted codepoint was `LF` — used to
    /// decide whether a synthetic final `LF` is needed at end of input.
    last_was_lf: bool,
    /// Whether the synthetic final `LF` has already been emitted, so a
    /// second call at end of input returns `Eof` rather than injecting
    /// another one.
    injected_final_lf: bool,
    /// Once set, every future read returns this same terminal value.
    terminal: Option<Result<Code, ErrorKind>>,
}

impl<S: Source> Filter<S> {
    /// Wraps `source` in a fresh filter. Line count starts at 1.
    pub fn new(source: S) -> Self {
        Self {
            source,
            pushback: None,
            line: 1,
            at_start: true,
            last_was_lf: false,
            injected_final_lf: false,
            terminal: None,
        }
    }

    /// Reads the next codepoint, or the terminal end of stream / error.
    pub fn read_code(&mut self) -> Result<Code, ErrorKind> {
        if let Some(terminal) = self.terminal {
            return terminal;
        }
        if let Some(cp) = self.pushback.take() {
            return Ok(Code::Value(cp));
        }

        let result = self.read_code_inner();
        if !matches!(result, Ok(Code::Value(_))) {
            self.terminal = Some(result);
        }
        result
    }

    /// Pushes `cp` back so the next [`read_code`](Filter::read_code) call
    /// returns it again.
    ///
    /// # Panics
    ///
    /// Panics if a codepoint is already pending pushback (spec.md §4.3:
    /// a caller contract violation, not a recoverable error).
    pub fn pushback(&mut self, cp: u32) {
        assert!(
            self.pushback.is_none(),
            "double pushback without an intervening read"
        );
        self.pushback = Some(cp);
    }

    /// Current line number. Saturates at `u64::MAX` rather than
    /// overflowing. Always `>= 1`.
    #[must_use]
    pub fn line_count(&self) -> u64 {
        self.line
    }

    fn read_code_inner(&mut self) -> Result<Code, ErrorKind> {
        let cp = match self.raw_decode()? {
            Some(cp) => cp,
            None => return self.inject_final_lf_or_eof(),
        };

        if self.at_start {
            self.at_start = false;
            if cp == BOM {
                // Discard the BOM and run the rest of the pipeline on the
                // codepoint that actually follows it.
                return self.read_code_inner();
            }
        }

        if cp == CR {
            return match self.raw_decode()? {
                Some(next) if next == LF => self.finish_emit(LF),
                _ => Err(ErrorKind::BadCr),
            };
        }

        if codec::is_high_surrogate(cp) {
            return match self.raw_decode()? {
                Some(lo) if codec::is_low_surrogate(lo) => {
                    self.finish_emit(codec::unpair(cp, lo))
                }
                _ => Err(ErrorKind::Unpaired),
            };
        }
        if codec::is_low_surrogate(cp) {
            return Err(ErrorKind::Unpaired);
        }

        self.finish_emit(cp)
    }

    /// Decodes one raw UTF-8 codepoint straight from the source, with no
    /// BOM/CR/surrogate handling applied. `Ok(None)` is a genuine,
    /// byte-level end of input (the caller decides whether that needs a
    /// synthetic final `LF`).
    fn raw_decode(&mut self) -> Result<Option<u32>, ErrorKind> {
        let lead = match self.source.read_byte() {
            ReadByte::Byte(b) => b,
            ReadByte::Eof => return Ok(None),
            ReadByte::IoErr => return Err(ErrorKind::IoErr),
        };
        let Some(trail_count) = codec::trail(lead) else {
            return Err(ErrorKind::Utf8);
        };

        let mut cont = [0u8; 3];
        for slot in cont.iter_mut().take(trail_count as usize) {
            match self.source.read_byte() {
                ReadByte::Byte(b) => *slot = b,
                // EOF in the middle of a multi-byte sequence is always Utf8,
                // never the clean end-of-input case (spec.md §7).
                ReadByte::Eof => return Err(ErrorKind::Utf8),
                ReadByte::IoErr => return Err(ErrorKind::IoErr),
            }
        }

        codec::decode(lead, &cont[..trail_count as usize])
            .map(Some)
            .ok_or(ErrorKind::Utf8)
    }

    fn inject_final_lf_or_eof(&mut self) -> Result<Code, ErrorKind> {
        if self.last_was_lf || self.injected_final_lf {
            Ok(Code::Eof)
        } else {
            self.injected_final_lf = true;
            self.finish_emit(LF)
        }
    }

    fn finish_emit(&mut self, cp: u32) -> Result<Code, ErrorKind> {
        if cp == LF {
            self.last_was_lf = true;
            self.line = self.line.saturating_add(1);
        } else {
            self.last_was_lf = false;
        }
        Ok(Code::Value(cp))
    }
}
