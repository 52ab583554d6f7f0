//! Codepoint-to-token layer (spec.md §4.4).
//!
//! Skips whitespace and `#`-comments, assembles plain tokens, and — for
//! tokens ending in `"` or `{` — reads the quoted or curly-nested string
//! payload that follows.

use shastina_core::{Code, ErrorKind, Filter, Source};

use crate::limits::Limits;
use crate::token::{Quoting, Token};

const SP: u32 = 0x20;
const HT: u32 = 0x09;
const LF: u32 = 0x0A;
const HASH: u32 = 0x23;
const PIPE: u32 = 0x7C;
const SEMI: u32 = 0x3B;
const QUOTE: u32 = 0x22;
const LCURLY: u32 = 0x7B;
const RCURLY: u32 = 0x7D;
const LPAREN: u32 = 0x28;
const RPAREN: u32 = 0x29;
const LSQR: u32 = 0x5B;
const RSQR: u32 = 0x5D;
const COMMA: u32 = 0x2C;
const PERCENT: u32 = 0x25;
const BACKSLASH: u32 = 0x5C;

fn is_legal(cp: u32) -> bool {
    cp == SP || cp == HT || cp == LF || (0x21..=0x7E).contains(&cp)
}

fn is_atomic(cp: u32) -> bool {
    matches!(
        cp,
        LPAREN | RPAREN | LSQR | RSQR | COMMA | PERCENT | SEMI | QUOTE | LCURLY | RCURLY
    )
}

fn is_exclusive_closer(cp: u32) -> bool {
    matches!(
        cp,
        SP | HT | LF | LPAREN | RPAREN | LSQR | RSQR | COMMA | PERCENT | SEMI | HASH | RCURLY
    )
}

/// Filter errors never produce a surrogate or an out-of-range value, so
/// this always succeeds; falls back to the replacement character rather
/// than panicking if that invariant is ever violated by a foreign `Source`.
fn push_codepoint(buf: &mut String, cp: u32) {
    buf.push(char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER));
}

/// Tokenizer over a [`Filter`].
pub struct Tokenizer<S> {
    filter: Filter<S>,
    limits: Limits,
    terminal: Option<Token>,
}

impl<S: Source> Tokenizer<S> {
    /// Wraps `filter` with the given limits.
    pub fn new(filter: Filter<S>, limits: Limits) -> Self {
        Self {
            filter,
            limits,
            terminal: None,
        }
    }

    /// Current line number, delegated to the underlying filter.
    #[must_use]
    pub fn line_count(&self) -> u64 {
        self.filter.line_count()
    }

    /// Reads the next token, or the latched terminal (`End` or `Error`).
    pub fn next_token(&mut self) -> Token {
        if let Some(terminal) = &self.terminal {
            return terminal.clone();
        }
        let result = self.next_token_inner();
        if matches!(result, Token::End | Token::Error(_)) {
            self.terminal = Some(result.clone());
        }
        result
    }

    fn next_token_inner(&mut self) -> Token {
        let first = match self.skip_whitespace_and_comments() {
            Ok(cp) => cp,
            Err(token) => return token,
        };

        if !is_legal(first) {
            return Token::Error(ErrorKind::BadChar);
        }

        if first == PIPE {
            match self.filter.read_code() {
                Ok(Code::Value(next)) if next == SEMI => return Token::End,
                Ok(Code::Value(next)) => self.filter.pushback(next),
                Ok(Code::Eof) => {}
                Err(e) => return Token::Error(e),
            }
            return self.assemble(first);
        }

        if is_atomic(first) {
            if first == QUOTE {
                return self.finish_string(String::new(), Quoting::Quoted);
            }
            if first == LCURLY {
                return self.finish_string(String::new(), Quoting::Curly);
            }
            let mut text = String::new();
            push_codepoint(&mut text, first);
            return Token::Simple(text);
        }

        self.assemble(first)
    }

    /// Skips `{SP, HT, LF}` and `#…LF` comments, returning the first
    /// codepoint that starts the next token, or the token-level outcome
    /// (`Error`) if the stream ends or fails first.
    fn skip_whitespace_and_comments(&mut self) -> Result<u32, Token> {
        loop {
            match self.filter.read_code() {
                Ok(Code::Value(cp)) if cp == SP || cp == HT || cp == LF => {}
                Ok(Code::Value(cp)) if cp == HASH => loop {
                    match self.filter.read_code() {
                        Ok(Code::Value(LF)) => break,
                        Ok(Code::Value(_)) => {}
                        Ok(Code::Eof) => return Err(Token::Error(ErrorKind::Eof)),
                        Err(e) => return Err(Token::Error(e)),
                    }
                },
                Ok(Code::Value(cp)) => return Ok(cp),
                Ok(Code::Eof) => return Err(Token::Error(ErrorKind::Eof)),
                Err(e) => return Err(Token::Error(e)),
            }
        }
    }

    /// Plain-token assembly (spec.md §4.4 step 5), given the already-read
    /// first codepoint.
    fn assemble(&mut self, first: u32) -> Token {
        let mut buf = String::new();
        push_codepoint(&mut buf, first);
        let mut len: u32 = 1;

        loop {
            match self.filter.read_code() {
                Ok(Code::Value(cp)) if is_exclusive_closer(cp) => {
                    self.filter.pushback(cp);
                    break;
                }
                Ok(Code::Value(QUOTE)) => return self.finish_string(buf, Quoting::Quoted),
                Ok(Code::Value(LCURLY)) => return self.finish_string(buf, Quoting::Curly),
                Ok(Code::Value(cp)) if !is_legal(cp) => return Token::Error(ErrorKind::BadChar),
                Ok(Code::Value(cp)) => {
                    len += 1;
                    if len > self.limits.max_token_len {
                        return Token::Error(ErrorKind::LongToken);
                    }
                    push_codepoint(&mut buf, cp);
                }
                // The filter always emits a final LF before Eof, so an
                // exclusive closer is reached first in practice; this
                // just avoids looping forever if that ever doesn't hold.
                Ok(Code::Eof) => break,
                Err(e) => return Token::Error(e),
            }
        }

        Token::Simple(buf)
    }

    fn finish_string(&mut self, prefix: String, quoting: Quoting) -> Token {
        match self.read_string_payload(quoting) {
            Ok(payload) => Token::String {
                prefix,
                quoting,
                payload,
            },
            Err(e) => Token::Error(e),
        }
    }

    /// String payload reading (spec.md §4.4 "String payload").
    fn read_string_payload(&mut self, quoting: Quoting) -> Result<String, ErrorKind> {
        let mut payload = String::new();
        let mut len: u32 = 0;
        let mut escape_parity_even = true;
        let mut curly_depth: u32 = 1;

        loop {
            let cp = match self.filter.read_code() {
                Ok(Code::Value(cp)) => cp,
                Ok(Code::Eof) => return Err(ErrorKind::OpenStr),
                Err(e) => return Err(e),
            };

            if cp == 0 {
                return Err(ErrorKind::NullChr);
            }

            match quoting {
                Quoting::Quoted => {
                    if cp == QUOTE && escape_parity_even {
                        return Ok(payload);
                    }
                }
                // Nesting depth tracks every brace, escaped or not, so an
                // escaped inner close still balances the inner open it
                // matches. Only the *termination* check (closing the
                // outer string) is gated on escape parity — an escaped
                // `}` that happens to bring depth to 0 does not close
                // the string, per spec.md §4.4.
                Quoting::Curly => {
                    if cp == LCURLY {
                        if curly_depth >= self.limits.max_curly_depth {
                            return Err(ErrorKind::DeepCurly);
                        }
                        curly_depth += 1;
                    } else if cp == RCURLY {
                        curly_depth = curly_depth.saturating_sub(1);
                        if curly_depth == 0 && escape_parity_even {
                            return Ok(payload);
                        }
                    }
                }
            }

            len += 1;
            if len > self.limits.max_string_len {
                return Err(ErrorKind::LongStr);
            }
            push_codepoint(&mut payload, cp);

            escape_parity_even = if cp == BACKSLASH {
                !escape_parity_even
            } else {
                true
            };
        }
    }
}
