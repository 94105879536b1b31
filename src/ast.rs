#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
}

impl BinOp {
    /// Maps a comparison operator token to its variant.
    pub fn comparison(op: &str) -> Option<Self> {
        match op {
            "==" => Some(BinOp::Eq),
            "!=" => Some(BinOp::Ne),
            ">" => Some(BinOp::Gt),
            "<" => Some(BinOp::Lt),
            ">=" => Some(BinOp::Ge),
            "<=" => Some(BinOp::Le),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    FieldRef(String),
    DotAccess {
        object: Box<Expr>, // always a FieldRef
        property: String,
    },
    StringLiteral(String),
    NumberLiteral(f64),
    BooleanLiteral(bool),
    NullLiteral,
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(operand: Expr) -> Self {
        Expr::UnaryOp {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Expr::FieldRef(name.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub cond: Expr,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// HTML-escaped output.
    Output(Expr),
    RawOutput(Expr),
    If {
        cond: Expr,
        body: Vec<Node>,
        elifs: Vec<Branch>,
        else_body: Option<Vec<Node>>,
    },
    Each {
        var_name: String,
        iterable: Expr,
        body: Vec<Node>,
    },
}

/// Root of a parsed template. Immutable once built and safe to render
/// any number of times.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub children: Vec<Node>,
}

impl Template {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Counts every node in the tree, the root excluded.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[Node]) -> usize {
            nodes
                .iter()
                .map(|node| {
                    1 + match node {
                        Node::Text(_) | Node::Output(_) | Node::RawOutput(_) => 0,
                        Node::If {
                            body,
                            elifs,
                            else_body,
                            ..
                        } => {
                            count(body)
                                + elifs.iter().map(|b| count(&b.body)).sum::<usize>()
                                + else_body.as_deref().map_or(0, count)
                        }
                        Node::Each { body, .. } => count(body),
                    }
                })
                .sum()
        }
        count(&self.children)
    }
}
