//! Transformation AST as handed over by the upstream parser.
//!
//! The node-kind set is a stable contract shared with the runtime evaluator;
//! this crate only reads it. JSON form is tagged by `"kind"`, e.g.
//! `{"kind": "call", "function": "sum", "args": [{"kind": "path", "path": "Order.Total"}]}`.
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub node: Node,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Literal {
        value: Literal,
    },
    /// Dotted/bracketed input path, or a local binding followed by fields.
    Path {
        path: String,
    },
    Member {
        target: Box<Expr>,
        field: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `input |> f(args…)` is `f(input, args…)`.
    Pipe {
        input: Box<Expr>,
        call: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    Record {
        #[serde(default)]
        properties: Vec<Property>,
    },
    Array {
        #[serde(default)]
        elements: Vec<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<Expr>>,
    },
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(OrderedFloat<f64>),
    String(String),
}

/// Record-construction entry. `let` entries are sequential, single-assignment
/// bindings visible to the properties after them and never emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Property {
    Field { name: String, value: Expr },
    Let { name: String, value: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => "++",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { UnaryOp::Neg => "-", UnaryOp::Not => "!" })
    }
}

// ------------------------------ Builders ---------------------------------- //
// Mostly for tests and embedders that construct trees by hand.

impl From<Node> for Expr {
    fn from(node: Node) -> Self {
        Expr { node, span: None }
    }
}

impl Expr {
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Some(Span { start, end });
        self
    }

    pub fn literal(value: Literal) -> Self { Node::Literal { value }.into() }
    pub fn null() -> Self { Self::literal(Literal::Null) }
    pub fn boolean(b: bool) -> Self { Self::literal(Literal::Boolean(b)) }
    pub fn int(i: i64) -> Self { Self::literal(Literal::Integer(i)) }
    pub fn number(n: f64) -> Self { Self::literal(Literal::Number(OrderedFloat(n))) }
    pub fn string(s: impl Into<String>) -> Self { Self::literal(Literal::String(s.into())) }

    pub fn path(path: impl Into<String>) -> Self {
        Node::Path { path: path.into() }.into()
    }

    pub fn member(target: Expr, field: impl Into<String>) -> Self {
        Node::Member { target: Box::new(target), field: field.into() }.into()
    }

    pub fn index(target: Expr, index: Expr) -> Self {
        Node::Index { target: Box::new(target), index: Box::new(index) }.into()
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Node::Unary { op, operand: Box::new(operand) }.into()
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Node::Binary { op, left: Box::new(left), right: Box::new(right) }.into()
    }

    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Node::Call { function: function.into(), args }.into()
    }

    pub fn pipe(input: Expr, call: Expr) -> Self {
        Node::Pipe { input: Box::new(input), call: Box::new(call) }.into()
    }

    pub fn lambda<I, S>(params: I, body: Expr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Node::Lambda {
            params: params.into_iter().map(Into::into).collect(),
            body: Box::new(body),
        }
        .into()
    }

    pub fn record(properties: Vec<Property>) -> Self {
        Node::Record { properties }.into()
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Node::Array { elements }.into()
    }

    pub fn conditional(condition: Expr, then: Expr, otherwise: Option<Expr>) -> Self {
        Node::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        }
        .into()
    }

    pub fn let_in(name: impl Into<String>, value: Expr, body: Expr) -> Self {
        Node::Let { name: name.into(), value: Box::new(value), body: Box::new(body) }.into()
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self.node, Node::Lambda { .. })
    }
}

impl Property {
    pub fn field(name: impl Into<String>, value: Expr) -> Self {
        Property::Field { name: name.into(), value }
    }

    pub fn binding(name: impl Into<String>, value: Expr) -> Self {
        Property::Let { name: name.into(), value }
    }
}
