//! Token-to-entity synthesizer (spec.md §4.5).
//!
//! Owns the metacommand flag, the array-pending latch, and the two
//! bounded stacks that resolve implicit array-element grouping. Multiple
//! entities produced by one token (`,` → `EndGroup, BeginGroup`; `]` →
//! `EndGroup, Array(n)`) are queued together so the consumer never
//! observes a partial update.

use std::collections::VecDeque;

use shastina_core::{ErrorKind, Filter, Source};
use tracing::{debug, trace};

use crate::entity::Entity;
use crate::limits::Limits;
use crate::token::{Quoting, Token};
use crate::tokenizer::Tokenizer;

/// Entity-synthesizing parser over a [`Tokenizer`].
pub struct Parser<S> {
    tokenizer: Tokenizer<S>,
    limits: Limits,
    meta: bool,
    array_pending: bool,
    array_stack: Vec<u32>,
    /// Always has at least one frame (the top-level group nesting).
    group_stack: Vec<u32>,
    queue: VecDeque<Entity>,
    terminal: Option<Entity>,
}

impl<S: Source> Parser<S> {
    /// Builds a parser reading from `source` under `limits`.
    pub fn new(source: S, limits: Limits) -> Self {
        Self {
            tokenizer: Tokenizer::new(Filter::new(source), limits),
            limits,
            meta: false,
            array_pending: false,
            array_stack: Vec::new(),
            group_stack: vec![0],
            queue: VecDeque::new(),
            terminal: None,
        }
    }

    /// Current line number, delegated through the tokenizer to the filter.
    ///
    /// Unaffected by the tokenizer's one-codepoint pushback, but may be
    /// off by one near a line break (spec.md §6).
    #[must_use]
    pub fn line_count(&self) -> u64 {
        self.tokenizer.line_count()
    }

    /// Reads the next entity, or the latched terminal (`Eof` or `Error`).
    pub fn read_entity(&mut self) -> Entity {
        if let Some(terminal) = &self.terminal {
            return terminal.clone();
        }
        // A single `pump()` call may enqueue nothing at all: the `[` token
        // only sets `array_pending` (spec.md's "array-pending latency"),
        // deferring its `BeginGroup` until the token that resolves it. Keep
        // pumping tokens until one actually produces an entity.
        while self.queue.is_empty() {
            self.pump();
        }
        let Some(entity) = self.queue.pop_front() else {
            unreachable!("loop above only exits once the queue is non-empty");
        };
        if matches!(entity, Entity::Error(_) | Entity::Eof) {
            trace!(?entity, "parser reached a terminal entity");
            self.terminal = Some(entity.clone());
        }
        entity
    }

    fn pump(&mut self) {
        match self.tokenizer.next_token() {
            Token::Error(e) => {
                debug!(?e, "tokenizer error, latching");
                self.queue.push_back(Entity::Error(e));
            }
            Token::End => self.handle_end(),
            Token::Simple(text) => self.handle_simple(&text),
            Token::String {
                prefix,
                quoting,
                payload,
            } => self.handle_string(prefix, quoting, payload),
        }
    }

    fn handle_end(&mut self) {
        if self.meta {
            self.queue.push_back(Entity::Error(ErrorKind::OpenMeta));
            return;
        }
        if self.array_pending || !self.array_stack.is_empty() {
            self.queue.push_back(Entity::Error(ErrorKind::OpenArray));
            return;
        }
        if self.group_stack.len() > 1 || self.group_top() != 0 {
            self.queue.push_back(Entity::Error(ErrorKind::OpenGroup));
            return;
        }
        debug!("reached |; with balanced state, emitting Eof");
        self.queue.push_back(Entity::Eof);
    }

    fn handle_simple(&mut self, text: &str) {
        if self.meta {
            match text {
                "%" => self.queue.push_back(Entity::Error(ErrorKind::MetaNest)),
                ";" => {
                    self.meta = false;
                    trace!("leaving metacommand mode");
                    self.queue.push_back(Entity::EndMeta);
                }
                other => self.queue.push_back(Entity::MetaToken(other.to_string())),
            }
            return;
        }

        if text != "]" {
            if let Err(e) = self.resolve_array_pending() {
                self.queue.push_back(Entity::Error(e));
                return;
            }
        }

        match text {
            "%" => {
                self.meta = true;
                trace!("entering metacommand mode");
                self.queue.push_back(Entity::BeginMeta);
            }
            ";" => self.queue.push_back(Entity::Error(ErrorKind::Semicolon)),
            "(" => self.handle_lparen(),
            ")" => self.handle_rparen(),
            "[" => self.array_pending = true,
            "]" => self.handle_rsqr(),
            "," => self.handle_comma(),
            _ => self.handle_content_token(text),
        }
    }

    fn handle_string(&mut self, prefix: String, quoting: Quoting, payload: String) {
        if self.meta {
            self.queue.push_back(Entity::MetaString {
                prefix,
                quoting,
                payload,
            });
            return;
        }
        if let Err(e) = self.resolve_array_pending() {
            self.queue.push_back(Entity::Error(e));
            return;
        }
        self.queue.push_back(Entity::String {
            prefix,
            quoting,
            payload,
        });
    }

    fn handle_content_token(&mut self, text: &str) {
        let mut chars = text.chars();
        match chars.next() {
            Some('?') => self
                .queue
                .push_back(Entity::Variable(chars.as_str().to_string())),
            Some('@') => self
                .queue
                .push_back(Entity::Constant(chars.as_str().to_string())),
            Some('=') => self
                .queue
                .push_back(Entity::Assign(chars.as_str().to_string())),
            Some(':') => self
                .queue
                .push_back(Entity::Get(chars.as_str().to_string())),
            Some(c) if c == '+' || c == '-' || c.is_ascii_digit() => {
                self.queue.push_back(Entity::Numeric(text.to_string()));
            }
            _ => self.queue.push_back(Entity::Operation(text.to_string())),
        }
    }

    fn handle_lparen(&mut self) {
        if self.group_top() >= self.limits.max_group_depth {
            self.queue.push_back(Entity::Error(ErrorKind::DeepGroup));
            return;
        }
        *self.group_top_mut() += 1;
        self.queue.push_back(Entity::BeginGroup);
    }

    fn handle_rparen(&mut self) {
        if self.group_top() == 0 {
            self.queue.push_back(Entity::Error(ErrorKind::RParen));
            return;
        }
        *self.group_top_mut() -= 1;
        self.queue.push_back(Entity::EndGroup);
    }

    fn handle_rsqr(&mut self) {
        if self.array_pending {
            self.array_pending = false;
            self.queue.push_back(Entity::Array(0));
            return;
        }
        if self.array_stack.is_empty() {
            self.queue.push_back(Entity::Error(ErrorKind::RSqr));
            return;
        }
        if self.group_top() != 0 {
            self.queue.push_back(Entity::Error(ErrorKind::OpenGroup));
            return;
        }
        let Some(n) = self.array_stack.pop() else {
            unreachable!("checked non-empty above");
        };
        self.group_stack.pop();
        debug!(n, "closing array");
        self.queue.push_back(Entity::EndGroup);
        self.queue.push_back(Entity::Array(n));
    }

    fn handle_comma(&mut self) {
        if self.array_stack.is_empty() {
            self.queue.push_back(Entity::Error(ErrorKind::Comma));
            return;
        }
        if self.group_top() != 0 {
            self.queue.push_back(Entity::Error(ErrorKind::OpenGroup));
            return;
        }
        let idx = self.array_stack.len() - 1;
        if self.array_stack[idx] >= self.limits.max_array_len {
            self.queue.push_back(Entity::Error(ErrorKind::LongArray));
            return;
        }
        self.array_stack[idx] += 1;
        self.queue.push_back(Entity::EndGroup);
        self.queue.push_back(Entity::BeginGroup);
    }

    /// Resolves a pending `[` before processing any non-`]` token outside
    /// metacommand mode (spec.md §4.5 "Array-pending resolution").
    fn resolve_array_pending(&mut self) -> Result<(), ErrorKind> {
        if !self.array_pending {
            return Ok(());
        }
        self.array_pending = false;
        if self.array_stack.len() as u32 >= self.limits.max_array_depth {
            return Err(ErrorKind::DeepArray);
        }
        self.array_stack.push(1);
        self.group_stack.push(0);
        trace!(depth = self.array_stack.len(), "opening array element group");
        self.queue.push_back(Entity::BeginGroup);
        Ok(())
    }

    fn group_top(&self) -> u32 {
        debug_assert!(
            !self.group_stack.is_empty(),
            "group_stack must always have a bottom frame"
        );
        self.group_stack[self.group_stack.len() - 1]
    }

    fn group_top_mut(&mut self) -> &mut u32 {
        debug_assert!(
            !self.group_stack.is_empty(),
            "group_stack must always have a bottom frame"
        );
        let idx = self.group_stack.len() - 1;
        &mut self.group_stack[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shastina_core::SliceSource;

    fn entities(input: &[u8]) -> Vec<Entity> {
        entities_with_limits(input, Limits::default())
    }

    fn entities_with_limits(input: &[u8], limits: Limits) -> Vec<Entity> {
        let mut parser = Parser::new(SliceSource::new(input), limits);
        let mut out = Vec::new();
        loop {
            let e = parser.read_entity();
            let done = matches!(e, Entity::Eof | Entity::Error(_));
            out.push(e);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scenario_empty_program() {
        assert_eq!(entities(b"|;"), vec![Entity::Eof]);
    }

    #[test]
    fn scenario_empty_array() {
        assert_eq!(entities(b"[ ] |;"), vec![Entity::Array(0), Entity::Eof]);
    }

    #[test]
    fn scenario_two_element_array() {
        assert_eq!(
            entities(b"[ 1 , 2 ] |;"),
            vec![
                Entity::BeginGroup,
                Entity::Numeric("1".into()),
                Entity::EndGroup,
                Entity::BeginGroup,
                Entity::Numeric("2".into()),
                Entity::EndGroup,
                Entity::Array(2),
                Entity::Eof,
            ]
        );
    }

    #[test]
    fn scenario_metacommand_with_string() {
        assert_eq!(
            entities(b"%  \"hello\"  ; |;"),
            vec![
                Entity::BeginMeta,
                Entity::MetaString {
                    prefix: String::new(),
                    quoting: Quoting::Quoted,
                    payload: "hello".into(),
                },
                Entity::EndMeta,
                Entity::Eof,
            ]
        );
    }

    #[test]
    fn scenario_curly_nesting_with_escape() {
        assert_eq!(
            entities(b"{a{b\\}c}d |;"),
            vec![
                Entity::String {
                    prefix: String::new(),
                    quoting: Quoting::Curly,
                    payload: "a{b\\}c".into(),
                },
                Entity::Operation("d".into()),
                Entity::Eof,
            ]
        );
    }

    #[test]
    fn scenario_bad_cr() {
        assert_eq!(
            entities(b"a\rb|;"),
            vec![Entity::Error(ErrorKind::BadCr)]
        );
    }

    #[test]
    fn scenario_unclosed_array() {
        assert_eq!(
            entities(b"[ 1 |;"),
            vec![
                Entity::BeginGroup,
                Entity::Numeric("1".into()),
                Entity::Error(ErrorKind::OpenArray),
            ]
        );
    }

    #[test]
    fn scenario_bare_right_paren() {
        assert_eq!(entities(b") |;"), vec![Entity::Error(ErrorKind::RParen)]);
    }

    #[test]
    fn group_inside_array_element() {
        assert_eq!(
            entities(b"[ ( a ) ] |;"),
            vec![
                Entity::BeginGroup,
                Entity::BeginGroup,
                Entity::Operation("a".into()),
                Entity::EndGroup,
                Entity::EndGroup,
                Entity::Array(1),
                Entity::Eof,
            ]
        );
    }

    #[test]
    fn bare_right_square_without_array() {
        assert_eq!(entities(b"] |;"), vec![Entity::Error(ErrorKind::RSqr)]);
    }

    #[test]
    fn comma_outside_array_is_error() {
        assert_eq!(entities(b", |;"), vec![Entity::Error(ErrorKind::Comma)]);
    }

    #[test]
    fn semicolon_without_metacommand_is_error() {
        assert_eq!(
            entities(b"; |;"),
            vec![Entity::Error(ErrorKind::Semicolon)]
        );
    }

    #[test]
    fn nested_metacommand_is_error() {
        assert_eq!(
            entities(b"% % ; ; |;"),
            vec![Entity::BeginMeta, Entity::Error(ErrorKind::MetaNest)]
        );
    }

    #[test]
    fn variable_constant_assign_get_strip_prefix() {
        assert_eq!(
            entities(b"?x @y =z :w |;"),
            vec![
                Entity::Variable("x".into()),
                Entity::Constant("y".into()),
                Entity::Assign("z".into()),
                Entity::Get("w".into()),
                Entity::Eof,
            ]
        );
    }

    #[test]
    fn empty_name_is_allowed() {
        assert_eq!(
            entities(b"? |;"),
            vec![Entity::Variable(String::new()), Entity::Eof]
        );
    }

    #[test]
    fn deep_array_limit_enforced() {
        let limits = Limits {
            max_array_depth: 1,
            ..Limits::default()
        };
        assert_eq!(
            entities_with_limits(b"[ [ 1 ] ] |;", limits),
            vec![
                Entity::BeginGroup,
                Entity::Error(ErrorKind::DeepArray),
            ]
        );
    }

    #[test]
    fn long_array_limit_enforced() {
        let limits = Limits {
            max_array_len: 1,
            ..Limits::default()
        };
        assert_eq!(
            entities_with_limits(b"[ 1 , 2 ] |;", limits),
            vec![
                Entity::BeginGroup,
                Entity::Numeric("1".into()),
                Entity::EndGroup,
                Entity::Error(ErrorKind::LongArray),
            ]
        );
    }

    #[test]
    fn deep_group_limit_enforced() {
        let limits = Limits {
            max_group_depth: 1,
            ..Limits::default()
        };
        assert_eq!(
            entities_with_limits(b"( ( a ) ) |;", limits),
            vec![Entity::BeginGroup, Entity::Error(ErrorKind::DeepGroup)]
        );
    }

    #[test]
    fn idempotent_after_eof() {
        let mut parser = Parser::new(SliceSource::new(b"|;"), Limits::default());
        assert_eq!(parser.read_entity(), Entity::Eof);
        assert_eq!(parser.read_entity(), Entity::Eof);
        assert_eq!(parser.read_entity(), Entity::Eof);
    }

    #[test]
    fn idempotent_after_error() {
        let mut parser = Parser::new(SliceSource::new(b") |;"), Limits::default());
        let first = parser.read_entity();
        let second = parser.read_entity();
        assert_eq!(first, Entity::Error(ErrorKind::RParen));
        assert_eq!(first, second);
    }

    #[test]
    fn balanced_begin_end_group_counts() {
        let stream = entities(b"[ ( 1 , 2 ) , ( 3 ) ] |;");
        let begins = stream
            .iter()
            .filter(|e| matches!(e, Entity::BeginGroup))
            .count();
        let ends = stream
            .iter()
            .filter(|e| matches!(e, Entity::EndGroup))
            .count();
        assert_eq!(begins, ends);
    }
}
