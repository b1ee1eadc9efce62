use std::rc::Rc;

use crate::reader::Position;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    In,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Const(Value),
    Var(String),
    Index(Box<Expr>, Box<Expr>),  // foo['bar'], foo[0]
    Attribute(Box<Expr>, String), // foo.bar
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
}

/// A `{% macro %}` definition. Shared between the tree and the callable
/// value it registers when evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub condition: Expr,
    pub body: Vec<Node>,
    pub else_branch: Option<ElseBranch>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    Else(Vec<Node>),
    Elif(Box<IfNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Comment(String),
    Print(Expr),
    If(IfNode),
    For {
        target: String,
        iterable: Expr,
        body: Vec<Node>,
        pos: Position,
    },
    Set {
        name: String,
        value: Expr,
        pos: Position,
    },
    Macro(Rc<MacroDef>),
}

/// Root of a parsed document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub nodes: Vec<Node>,
}
