//! Template lexer: splits a template into text runs and `{{ ... }}` tags.
//!
//! The lexer only finds tag boundaries and classifies tag bodies. Expression
//! bodies are tokenized later, one at a time, by [`crate::tokenizer`].

use crate::error::ParseError;
use std::fmt;

pub const OPEN: &str = "{{";
pub const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    Expression,
    RawExpression,
    BlockOpen,
    BlockClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Elif,
    Else,
    EndIf,
    Each,
    EndEach,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::EndIf => "endif",
            Keyword::Each => "each",
            Keyword::EndEach => "endeach",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Literal text, expression source, or block condition.
    pub text: String,
    pub keyword: Option<Keyword>,
    /// Byte offset of the segment in the template.
    pub offset: usize,
}

impl Segment {
    fn text(text: &str, offset: usize) -> Self {
        Self {
            kind: SegmentKind::Text,
            text: text.to_string(),
            keyword: None,
            offset,
        }
    }
}

/// Lexes `template` with the default 2000-character tag body limit.
pub fn tokenize(template: &str) -> Result<Vec<Segment>, ParseError> {
    Lexer::new(template).tokenize()
}

pub struct Lexer<'a> {
    input: &'a str,
    cursor: usize,
    max_expression_length: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            max_expression_length: crate::Limits::default().max_expression_length,
        }
    }

    pub fn with_max_expression_length(mut self, max: usize) -> Self {
        self.max_expression_length = max;
        self
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    pub fn tokenize(mut self) -> Result<Vec<Segment>, ParseError> {
        let mut segments = Vec::new();
        while !self.remaining().is_empty() {
            let rest = self.remaining();
            match rest.find(OPEN) {
                Some(0) => segments.push(self.tag()?),
                Some(idx) => {
                    segments.push(Segment::text(&rest[..idx], self.cursor));
                    self.cursor += idx;
                }
                None => {
                    segments.push(Segment::text(rest, self.cursor));
                    self.cursor = self.input.len();
                }
            }
        }
        Ok(segments)
    }

    /// Consumes one tag starting at the cursor, which sits on `{{`.
    fn tag(&mut self) -> Result<Segment, ParseError> {
        let offset = self.cursor;
        let mut body_start = offset + OPEN.len();
        let raw = self.input[body_start..].starts_with('!');
        if raw {
            body_start += 1;
        }

        let close = find_close(&self.input[body_start..])
            .ok_or(ParseError::UnclosedExpression { offset })?;
        let body = self.input[body_start..body_start + close].trim();
        self.cursor = body_start + close + CLOSE.len();

        let len = body.chars().count();
        if len > self.max_expression_length {
            return Err(ParseError::ExpressionTooLong {
                offset,
                len,
                max: self.max_expression_length,
            });
        }

        let (kind, keyword, text) = if raw {
            (SegmentKind::RawExpression, None, body)
        } else {
            classify(body)
        };
        Ok(Segment {
            kind,
            text: text.to_string(),
            keyword,
            offset,
        })
    }
}

/// Byte index of the first `}}` outside a double-quoted string.
fn find_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            b'}' if !in_string && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn classify(body: &str) -> (SegmentKind, Option<Keyword>, &str) {
    let (head, tail) = match body.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim_start()),
        None => (body, ""),
    };
    match (head, tail.is_empty()) {
        ("if", _) => (SegmentKind::BlockOpen, Some(Keyword::If), tail),
        ("elif", _) => (SegmentKind::BlockOpen, Some(Keyword::Elif), tail),
        ("each", _) => (SegmentKind::BlockOpen, Some(Keyword::Each), tail),
        ("else", true) => (SegmentKind::BlockOpen, Some(Keyword::Else), ""),
        ("endif", true) => (SegmentKind::BlockClose, Some(Keyword::EndIf), ""),
        ("endeach", true) => (SegmentKind::BlockClose, Some(Keyword::EndEach), ""),
        _ => (SegmentKind::Expression, None, body),
    }
}
