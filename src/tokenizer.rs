//! Expression tokenizer: splits the source of one `{{ ... }}` body (or a
//! block condition) into a flat token list.
//!
//! Two-character operators are matched before single-character ones, and a
//! `.` only belongs to a number when a digit follows it.

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    String,
    Number,
    Keyword,
    Identifier,
    Operator,
    Paren,
    Comma,
    Dot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Unescaped contents for strings, source text for everything else.
    pub value: String,
    /// Byte offset in the expression source.
    pub pos: usize,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, pos: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            pos,
        }
    }

    pub fn is(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value == value
    }
}

pub const KEYWORDS: [&str; 6] = ["and", "or", "not", "true", "false", "null"];

const OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

pub fn tokenize(expr: &str) -> Result<Vec<Token>, ParseError> {
    Tokenizer::new(expr).collect()
}

#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, cursor: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    fn take(&mut self, kind: TokenKind, len: usize) -> Token {
        let start = self.cursor;
        self.advance(len);
        Token::new(kind, &self.input[start..self.cursor], start)
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.advance(rest.len() - trimmed.len());

        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        if first == '"' {
            return self.string().map(Some);
        }

        if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            return Ok(Some(self.take(TokenKind::Operator, op.len())));
        }

        let token = match first {
            '(' | ')' => self.take(TokenKind::Paren, 1),
            ',' => self.take(TokenKind::Comma, 1),
            '.' => self.take(TokenKind::Dot, 1),
            c if c.is_ascii_digit() => {
                let bytes = rest.as_bytes();
                let mut len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
                if bytes.get(len) == Some(&b'.')
                    && bytes.get(len + 1).is_some_and(|b| b.is_ascii_digit())
                {
                    len += 1;
                    len += bytes[len..].iter().take_while(|b| b.is_ascii_digit()).count();
                }
                self.take(TokenKind::Number, len)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = rest
                    .bytes()
                    .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                    .count();
                let kind = if KEYWORDS.contains(&&rest[..len]) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Identifier
                };
                self.take(kind, len)
            }
            ch => {
                return Err(ParseError::UnexpectedCharacter {
                    ch,
                    pos: self.cursor,
                })
            }
        };
        Ok(Some(token))
    }

    fn string(&mut self) -> Result<Token, ParseError> {
        let start = self.cursor;
        let mut s = String::new();
        let mut chars = self.remaining().char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.advance(i + 1);
                    return Ok(Token::new(TokenKind::String, s, start));
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, esc)) => s.push(esc),
                    None => break,
                },
                _ => s.push(c),
            }
        }
        Err(ParseError::UnterminatedString { pos: start })
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}
