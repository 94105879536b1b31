//! Recursive-descent parsing in two layers.
//!
//! `ExprParser` turns the tokens of one expression into an [`Expr`];
//! [`Parser`] walks the lexer's segments and builds the block structure,
//! handing every expression body to the expression layer. Function names are
//! resolved against the registry here, so templates that call unknown
//! functions fail before anything renders.

use crate::ast::*;
use crate::error::ParseError;
use crate::functions::FunctionRegistry;
use crate::lexer::{Keyword, Segment, SegmentKind};
use crate::tokenizer::{self, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::iter::Peekable;
use std::vec::IntoIter;

/// Cap on parenthesised groups, `not` operands, call arguments and
/// `and`/`or` chains inside one expression. The length cap alone still
/// admits a thousand nested parentheses.
pub const MAX_EXPRESSION_DEPTH: usize = 64;

static EACH_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s+in\s+(.+)$").expect("each syntax regex is valid")
});

/// Parses a single expression, validating function names against `registry`.
pub fn parse_expression(text: &str, registry: &FunctionRegistry) -> Result<Expr, ParseError> {
    let tokens = tokenizer::tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::EmptyExpression);
    }
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        depth: 0,
        registry,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        Some(token) => Err(unexpected(token, "end of expression")),
        None => Ok(expr),
    }
}

/// Builds a template from lexed segments with the given nesting cap.
pub fn parse(
    segments: Vec<Segment>,
    registry: &FunctionRegistry,
    max_depth: usize,
) -> Result<Template, ParseError> {
    Parser::new(segments, registry, max_depth).parse()
}

fn unexpected(token: &Token, expected: &str) -> ParseError {
    ParseError::UnexpectedToken {
        found: token.value.clone(),
        expected: expected.to_string(),
    }
}

struct ExprParser<'r> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    registry: &'r FunctionRegistry,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, kind: TokenKind, value: &str) -> bool {
        self.peek().is_some_and(|t| t.is(kind, value))
    }

    fn consume(&mut self, expected: &str) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::UnexpectedEnd {
                expected: expected.to_string(),
            })?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, value: &str) -> Result<(), ParseError> {
        let expected = format!("{value:?}");
        let token = self.consume(&expected)?;
        if token.is(kind, value) {
            Ok(())
        } else {
            Err(unexpected(&token, &expected))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(ParseError::ExpressionTooDeep {
                max: MAX_EXPRESSION_DEPTH,
            });
        }
        Ok(())
    }

    // Each extra operand deepens the left-leaning tree by one level.
    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut lhs = self.parse_and()?;
        while self.peek_is(TokenKind::Keyword, "or") {
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_and()?;
            lhs = Expr::binary(BinOp::Or, lhs, rhs);
        }
        self.depth = base;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut lhs = self.parse_comparison()?;
        while self.peek_is(TokenKind::Keyword, "and") {
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_comparison()?;
            lhs = Expr::binary(BinOp::And, lhs, rhs);
        }
        self.depth = base;
        Ok(lhs)
    }

    // At most one comparison: `a < b < c` leaves `< c` as trailing input.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_unary()?;
        let op = match self.peek() {
            Some(t) if t.kind == TokenKind::Operator => BinOp::comparison(&t.value),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let rhs = self.parse_unary()?;
                Ok(Expr::binary(op, lhs, rhs))
            }
            None => Ok(lhs),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek_is(TokenKind::Keyword, "not") {
            self.pos += 1;
            self.enter()?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::not(operand));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.consume("an expression")?;
        match token.kind {
            TokenKind::Paren if token.value == "(" => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.expect(TokenKind::Paren, ")")?;
                self.depth -= 1;
                Ok(inner)
            }
            TokenKind::String => Ok(Expr::StringLiteral(token.value)),
            TokenKind::Number => token
                .value
                .parse()
                .map(Expr::NumberLiteral)
                .map_err(|_| ParseError::InvalidNumber(token.value)),
            TokenKind::Keyword => match token.value.as_str() {
                "true" => Ok(Expr::BooleanLiteral(true)),
                "false" => Ok(Expr::BooleanLiteral(false)),
                "null" => Ok(Expr::NullLiteral),
                _ => Err(unexpected(&token, "an expression")),
            },
            TokenKind::Identifier => {
                if self.peek_is(TokenKind::Paren, "(") {
                    self.pos += 1;
                    self.parse_call(token.value)
                } else if self.peek_is(TokenKind::Dot, ".") {
                    self.pos += 1;
                    let property = self.consume("a property name")?;
                    if property.kind != TokenKind::Identifier {
                        return Err(unexpected(&property, "a property name"));
                    }
                    Ok(Expr::DotAccess {
                        object: Box::new(Expr::FieldRef(token.value)),
                        property: property.value,
                    })
                } else {
                    Ok(Expr::FieldRef(token.value))
                }
            }
            _ => Err(unexpected(&token, "an expression")),
        }
    }

    /// Called with the opening parenthesis already consumed.
    fn parse_call(&mut self, name: String) -> Result<Expr, ParseError> {
        if !self.registry.has(&name) {
            return Err(ParseError::UnknownFunction(name));
        }
        let mut args = Vec::new();
        if self.peek_is(TokenKind::Paren, ")") {
            self.pos += 1;
            return Ok(Expr::FunctionCall { name, args });
        }
        self.enter()?;
        loop {
            args.push(self.parse_or()?);
            let token = self.consume("\",\" or \")\"")?;
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::Paren if token.value == ")" => break,
                _ => return Err(unexpected(&token, "\",\" or \")\"")),
            }
        }
        self.depth -= 1;
        Ok(Expr::FunctionCall { name, args })
    }
}

pub struct Parser<'r> {
    segments: Peekable<IntoIter<Segment>>,
    registry: &'r FunctionRegistry,
    depth: usize,
    max_depth: usize,
}

impl<'r> Parser<'r> {
    pub fn new(segments: Vec<Segment>, registry: &'r FunctionRegistry, max_depth: usize) -> Self {
        Self {
            segments: segments.into_iter().peekable(),
            registry,
            depth: 0,
            max_depth,
        }
    }

    pub fn parse(mut self) -> Result<Template, ParseError> {
        let children = self.parse_nodes()?;
        // parse_nodes only stops early on a block tag nothing is waiting for
        match self.segments.next() {
            Some(stray) => Err(unexpected_block(&stray)),
            None => Ok(Template::new(children)),
        }
    }

    /// Parses until end of input or, without consuming it, the first
    /// `elif`, `else` or closing tag at this level.
    fn parse_nodes(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        while let Some(segment) = self.segments.next_if(|s| !ends_body(s)) {
            let node = match (segment.kind, segment.keyword) {
                (SegmentKind::Text, _) => Node::Text(segment.text),
                (SegmentKind::Expression, _) => Node::Output(self.expression(&segment.text)?),
                (SegmentKind::RawExpression, _) => {
                    Node::RawOutput(self.expression(&segment.text)?)
                }
                (SegmentKind::BlockOpen, Some(Keyword::If)) => self.parse_if(segment)?,
                (SegmentKind::BlockOpen, Some(Keyword::Each)) => self.parse_each(segment)?,
                _ => return Err(unexpected_block(&segment)),
            };
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn expression(&self, text: &str) -> Result<Expr, ParseError> {
        parse_expression(text, self.registry)
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::NestingTooDeep {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn parse_if(&mut self, open: Segment) -> Result<Node, ParseError> {
        self.enter()?;
        let cond = self.expression(&open.text)?;
        let body = self.parse_nodes()?;
        let mut elifs = Vec::new();
        let mut else_body = None;

        loop {
            let Some(segment) = self.segments.next() else {
                return Err(unclosed(&open));
            };
            match segment.keyword {
                Some(Keyword::Elif) => {
                    let cond = self.expression(&segment.text)?;
                    let body = self.parse_nodes()?;
                    elifs.push(Branch { cond, body });
                }
                Some(Keyword::Else) => {
                    else_body = Some(self.parse_nodes()?);
                    match self.segments.next() {
                        Some(close) if close.keyword == Some(Keyword::EndIf) => break,
                        Some(other) => return Err(unexpected_block(&other)),
                        None => return Err(unclosed(&open)),
                    }
                }
                Some(Keyword::EndIf) => break,
                _ => return Err(unexpected_block(&segment)),
            }
        }

        self.depth -= 1;
        Ok(Node::If {
            cond,
            body,
            elifs,
            else_body,
        })
    }

    fn parse_each(&mut self, open: Segment) -> Result<Node, ParseError> {
        self.enter()?;
        let caps = EACH_SYNTAX
            .captures(&open.text)
            .filter(|caps| !tokenizer::KEYWORDS.contains(&&caps[1]))
            .ok_or_else(|| ParseError::InvalidEach(open.text.clone()))?;
        let var_name = caps[1].to_string();
        let iterable = self.expression(&caps[2])?;
        let body = self.parse_nodes()?;

        match self.segments.next() {
            Some(close) if close.keyword == Some(Keyword::EndEach) => {}
            Some(other) => return Err(unexpected_block(&other)),
            None => return Err(unclosed(&open)),
        }

        self.depth -= 1;
        Ok(Node::Each {
            var_name,
            iterable,
            body,
        })
    }
}

fn ends_body(segment: &Segment) -> bool {
    segment.kind == SegmentKind::BlockClose
        || matches!(segment.keyword, Some(Keyword::Elif | Keyword::Else))
}

fn keyword_name(segment: &Segment) -> String {
    segment
        .keyword
        .map_or_else(|| segment.text.clone(), |k| k.as_str().to_string())
}

fn unexpected_block(segment: &Segment) -> ParseError {
    ParseError::UnexpectedBlock {
        keyword: keyword_name(segment),
        offset: segment.offset,
    }
}

fn unclosed(open: &Segment) -> ParseError {
    ParseError::UnclosedBlock {
        keyword: keyword_name(open),
        offset: open.offset,
    }
}
