//! tagexpr: bounded `{{ expr }}` template interpreter for CMS hydration.
//!
//! The host pipeline hands over a template region and a data context; this
//! crate returns the rendered string or an error. It does no I/O and keeps
//! no state between renders.
//!
//! Supported syntax:
//! - `{{ expr }}` (HTML-escaped) and `{{! expr }}` (raw) output.
//! - `{{if c}} ... {{elif c}} ... {{else}} ... {{endif}}`.
//! - `{{each item in items}} ... {{endeach}}`, with `loop.index`,
//!   `loop.count`, `loop.first`, `loop.last` (and `loop.key` over maps).
//! - Expressions: `or`, `and`, `not`, one comparison (`== != > < >= <=`),
//!   double-quoted strings, numbers, `true`/`false`/`null`, `a`, `a.b`, and
//!   calls to functions registered on the [`Engine`].
//!
//! Not supported:
//! - Arithmetic, filters, assignments, includes.
//! - Deeper property paths than `a.b`.
//!
//! Every render is bounded by [`Limits`]: loop iterations, `if`/`each`
//! nesting, call depth, output size and tag body length. Hitting a limit
//! fails the render; output is never truncated.

pub mod ast;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod limits;
pub mod parser;
pub mod tokenizer;
pub mod value;

pub use ast::Template;
pub use error::{Error, LimitError, ParseError, Result, RuntimeError};
pub use eval::Evaluator;
pub use functions::{FunctionError, FunctionRegistry, FunctionResult};
pub use limits::Limits;
pub use value::{Context, Map, Value};

/// Cheap pre-check: templates without `{{` can skip the interpreter.
pub fn has_expressions(template: &str) -> bool {
    template.contains(lexer::OPEN)
}

/// Function registry plus limits; compiles and renders templates.
///
/// Register functions at startup, then share the engine (it is `Send +
/// Sync`) across requests.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: FunctionRegistry,
    limits: Limits,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            registry: FunctionRegistry::new(),
            limits,
        }
    }

    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        self.registry.register(name, f);
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Lexes and parses `template`. The result can be rendered many times.
    pub fn compile(&self, template: &str) -> Result<Template, ParseError> {
        let segments = lexer::Lexer::new(template)
            .with_max_expression_length(self.limits.max_expression_length)
            .tokenize()?;
        let segment_count = segments.len();
        let ast = parser::parse(segments, &self.registry, self.limits.max_nesting_depth)?;
        log::debug!(
            "compiled template: {segment_count} segments, {} nodes",
            ast.node_count()
        );
        Ok(ast)
    }

    pub fn render(&self, template: &Template, context: &Context) -> Result<String> {
        Evaluator::new(&self.registry, self.limits).evaluate(template, context)
    }

    /// Compile and render in one step.
    pub fn evaluate(&self, template: &str, context: &Context) -> Result<String> {
        let ast = self.compile(template)?;
        self.render(&ast, context)
    }
}
