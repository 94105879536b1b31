use crate::ast::*;
use crate::error::{Error, LimitError, Result};
use crate::functions::FunctionRegistry;
use crate::limits::Limits;
use crate::value::{Context, Map, Value};
use std::cmp::Ordering;

/// Tree-walking renderer for parsed templates.
///
/// The evaluator only borrows the registry and copies the limits. All
/// per-render state (scope stack, counters, output buffer) is created inside
/// [`Evaluator::evaluate`], so one evaluator can serve any number of renders,
/// sequentially or from several threads.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'e> {
    registry: &'e FunctionRegistry,
    limits: Limits,
}

impl<'e> Evaluator<'e> {
    pub fn new(registry: &'e FunctionRegistry, limits: Limits) -> Self {
        Self { registry, limits }
    }

    pub fn evaluate(&self, template: &Template, context: &Context) -> Result<String> {
        let mut render = Render {
            registry: self.registry,
            limits: &self.limits,
            scopes: Scopes::new(context),
            budget: Budget::default(),
            out: String::new(),
        };
        render.nodes(&template.children)?;
        log::debug!(
            "rendered {} bytes in {} loop iterations",
            render.out.len(),
            render.budget.loop_iterations
        );
        Ok(render.out)
    }
}

/// Counters of a single render. The output budget is checked against the
/// buffer length instead.
#[derive(Debug, Default)]
struct Budget {
    loop_iterations: usize,
    depth: usize,
    call_depth: usize,
}

/// Root context plus one frame per active loop iteration, innermost last.
struct Scopes<'c> {
    root: &'c Context,
    frames: Vec<Map>,
}

impl<'c> Scopes<'c> {
    fn new(root: &'c Context) -> Self {
        Self {
            root,
            frames: Vec::new(),
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.root.get(name))
    }

    fn push(&mut self, frame: Map) {
        self.frames.push(frame);
    }

    fn pop(&mut self) {
        self.frames.pop();
    }
}

struct Render<'a> {
    registry: &'a FunctionRegistry,
    limits: &'a Limits,
    scopes: Scopes<'a>,
    budget: Budget,
    out: String,
}

impl Render<'_> {
    fn limit(&self, err: LimitError) -> Error {
        log::warn!("template render aborted: {err}");
        err.into()
    }

    fn emit(&mut self, s: &str) -> Result<()> {
        if self.out.len() + s.len() > self.limits.max_output_bytes {
            return Err(self.limit(LimitError::OutputSize {
                max: self.limits.max_output_bytes,
            }));
        }
        self.out.push_str(s);
        Ok(())
    }

    fn nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            self.node(node)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::Text(text) => self.emit(text),
            Node::Output(expr) => {
                let value = self.eval(expr)?;
                self.emit(&escape_html(&value.to_output_string()))
            }
            Node::RawOutput(expr) => {
                let value = self.eval(expr)?;
                self.emit(&value.to_output_string())
            }
            Node::If {
                cond,
                body,
                elifs,
                else_body,
            } => self.nested(|r| {
                if r.eval(cond)?.is_truthy() {
                    return r.nodes(body);
                }
                for branch in elifs {
                    if r.eval(&branch.cond)?.is_truthy() {
                        return r.nodes(&branch.body);
                    }
                }
                match else_body {
                    Some(body) => r.nodes(body),
                    None => Ok(()),
                }
            }),
            Node::Each {
                var_name,
                iterable,
                body,
            } => self.nested(|r| {
                let items = iteration_items(r.eval(iterable)?);
                let len = items.len();
                for (index, (key, item)) in items.into_iter().enumerate() {
                    r.budget.loop_iterations += 1;
                    if r.budget.loop_iterations > r.limits.max_loop_iterations {
                        return Err(r.limit(LimitError::LoopIterations {
                            max: r.limits.max_loop_iterations,
                        }));
                    }

                    let mut meta = Map::new();
                    meta.insert("index".into(), index.into());
                    meta.insert("count".into(), (index + 1).into());
                    meta.insert("first".into(), (index == 0).into());
                    meta.insert("last".into(), (index + 1 == len).into());
                    if let Some(key) = key {
                        meta.insert("key".into(), key.into());
                    }
                    let mut frame = Map::new();
                    frame.insert(var_name.clone(), item);
                    frame.insert("loop".into(), Value::Map(meta));

                    r.scopes.push(frame);
                    let rendered = r.nodes(body);
                    r.scopes.pop();
                    rendered?;
                }
                Ok(())
            }),
        }
    }

    /// Runs `f` one `if`/`each` level deeper.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.budget.depth += 1;
        let result = if self.budget.depth > self.limits.max_nesting_depth {
            Err(self.limit(LimitError::NestingDepth {
                max: self.limits.max_nesting_depth,
            }))
        } else {
            f(self)
        };
        self.budget.depth -= 1;
        result
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::FieldRef(name) => Ok(self.scopes.get(name).cloned().unwrap_or_default()),
            Expr::DotAccess { object, property } => {
                let found = match object.as_ref() {
                    Expr::FieldRef(name) => self
                        .scopes
                        .get(name)
                        .and_then(|v| v.get(property))
                        .cloned(),
                    other => self.eval(other)?.get(property).cloned(),
                };
                Ok(found.unwrap_or_default())
            }
            Expr::StringLiteral(s) => Ok(Value::String(s.clone())),
            Expr::NumberLiteral(n) => Ok(Value::Number(*n)),
            Expr::BooleanLiteral(b) => Ok(Value::Bool(*b)),
            Expr::NullLiteral => Ok(Value::Null),
            Expr::BinaryOp { op, left, right } => self.binary(*op, left, right),
            Expr::UnaryOp {
                op: UnaryOp::Not,
                operand,
            } => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
            Expr::FunctionCall { name, args } => self.call(name, args),
        }
    }

    fn binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<Value> {
        let lhs = self.eval(left)?;
        let result = match op {
            BinOp::And => lhs.is_truthy() && self.eval(right)?.is_truthy(),
            BinOp::Or => lhs.is_truthy() || self.eval(right)?.is_truthy(),
            BinOp::Eq => lhs.to_output_string() == self.eval(right)?.to_output_string(),
            BinOp::Ne => lhs.to_output_string() != self.eval(right)?.to_output_string(),
            BinOp::Gt | BinOp::Lt | BinOp::Ge | BinOp::Le => {
                let rhs = self.eval(right)?;
                match (compare(&lhs, &rhs), op) {
                    (None, _) => false,
                    (Some(ord), BinOp::Gt) => ord == Ordering::Greater,
                    (Some(ord), BinOp::Lt) => ord == Ordering::Less,
                    (Some(ord), BinOp::Ge) => ord != Ordering::Less,
                    (Some(ord), _) => ord != Ordering::Greater,
                }
            }
        };
        Ok(Value::Bool(result))
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Value> {
        self.budget.call_depth += 1;
        let result = if self.budget.call_depth > self.limits.max_call_depth {
            Err(self.limit(LimitError::CallDepth {
                max: self.limits.max_call_depth,
            }))
        } else {
            self.invoke(name, args)
        };
        self.budget.call_depth -= 1;
        result
    }

    fn invoke(&mut self, name: &str, args: &[Expr]) -> Result<Value> {
        let values = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>>>()?;
        log::trace!("calling template function {name} with {} args", values.len());
        Ok(self.registry.call(name, &values)?)
    }
}

/// Numeric when both sides are numeric, lexical otherwise. `None` only for NaN.
fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(lhs.to_output_string().cmp(&rhs.to_output_string())),
    }
}

/// What an `each` walks: null and `""` give nothing, arrays their elements,
/// maps their values (with keys), any other scalar itself.
fn iteration_items(value: Value) -> Vec<(Option<String>, Value)> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        Value::Array(items) => items.into_iter().map(|item| (None, item)).collect(),
        Value::Map(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        scalar => vec![(None, scalar)],
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
