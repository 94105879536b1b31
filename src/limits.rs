use serde::{Deserialize, Serialize};

/// Hard caps applied to every compile and render.
///
/// All fields are optional when deserialized; missing ones take the
/// defaults below, so a host config only needs to name what it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Total `each` iterations across one render, nested loops included.
    pub max_loop_iterations: usize,
    /// Combined `if`/`each` nesting, enforced at parse and render time.
    pub max_nesting_depth: usize,
    /// Depth of nested function calls inside one expression.
    pub max_call_depth: usize,
    /// Bytes of rendered output.
    pub max_output_bytes: usize,
    /// Characters in a single trimmed tag body.
    pub max_expression_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_loop_iterations: 1000,
            max_nesting_depth: 10,
            max_call_depth: 5,
            max_output_bytes: 1024 * 1024,
            max_expression_length: 2000,
        }
    }
}

impl Limits {
    pub fn with_max_loop_iterations(mut self, max: usize) -> Self {
        self.max_loop_iterations = max;
        self
    }

    pub fn with_max_nesting_depth(mut self, max: usize) -> Self {
        self.max_nesting_depth = max;
        self
    }

    pub fn with_max_call_depth(mut self, max: usize) -> Self {
        self.max_call_depth = max;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    pub fn with_max_expression_length(mut self, max: usize) -> Self {
        self.max_expression_length = max;
        self
    }
}
