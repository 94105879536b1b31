//! Error taxonomy shared by every stage of the pipeline.
//!
//! Parse errors are deterministic for a given template. Limit and runtime
//! errors depend on the data being rendered. All of them abort the render;
//! callers never receive partial output.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Compile-time failures raised by the lexer, tokenizer and parsers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unclosed expression starting at byte {offset}")]
    UnclosedExpression { offset: usize },

    #[error("expression at byte {offset} is {len} characters long (max {max})")]
    ExpressionTooLong { offset: usize, len: usize, max: usize },

    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },

    #[error("unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },

    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),

    #[error("empty expression")]
    EmptyExpression,

    #[error("unexpected token {found:?}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("invalid each syntax {0:?}, expected `each <var> in <expr>`")]
    InvalidEach(String),

    #[error("unexpected {{{{{keyword}}}}} at byte {offset}")]
    UnexpectedBlock { keyword: String, offset: usize },

    #[error("unclosed {{{{{keyword}}}}} opened at byte {offset}")]
    UnclosedBlock { keyword: String, offset: usize },

    #[error("block nesting exceeds {max} levels")]
    NestingTooDeep { max: usize },

    #[error("expression nesting exceeds {max} levels")]
    ExpressionTooDeep { max: usize },
}

/// Resource budget exhausted while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("loop iteration limit of {max} exceeded")]
    LoopIterations { max: usize },

    #[error("nesting depth limit of {max} exceeded")]
    NestingDepth { max: usize },

    #[error("function call depth limit of {max} exceeded")]
    CallDepth { max: usize },

    #[error("output size limit of {max} bytes exceeded")]
    OutputSize { max: usize },
}

/// Data-dependent failures that are not resource limits.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// The registry no longer knows a function the template was compiled against.
    #[error("function {0:?} is not registered")]
    UnknownFunction(String),

    #[error("function {name:?} failed: {message}")]
    Function { name: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("resource limit: {0}")]
    Limit(#[from] LimitError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse(_))
    }

    pub fn is_limit(&self) -> bool {
        matches!(self, Error::Limit(_))
    }
}
