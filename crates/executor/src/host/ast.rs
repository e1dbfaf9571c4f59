//! Syntax tree of `host:` expressions.
use talc_tales::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostExpr {
    Literal(Value),
    Name(String),
    List(Vec<HostExpr>),
    Unary(UnaryOp, Box<HostExpr>),
    Binary(BinaryOp, Box<HostExpr>, Box<HostExpr>),
    /// `value.name`
    Member(Box<HostExpr>, String),
    /// `value[index]`
    Index(Box<HostExpr>, Box<HostExpr>),
    /// `name(args)`, or `value.name(args)` with `value` as the first argument.
    Call { function: String, args: Vec<HostExpr> },
}
