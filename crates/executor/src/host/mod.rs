//! The `host:` expression language understood by the interpreter backend.
//!
//! A small Python-flavoured expression grammar: literals, names, member
//! access, indexing, calls into a [`FunctionRegistry`], arithmetic,
//! comparisons and boolean operators.

pub mod ast;
pub mod eval;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOp, HostExpr, UnaryOp};
pub use eval::HostRuntime;
pub use functions::{FunctionRegistry, HostFunction, LIBRARIES};
pub use parser::parse_host;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("Syntax error in host expression '{code}': {message}")]
    Syntax { code: String, message: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Unknown function library: {0}")]
    UnknownLibrary(String),
}
