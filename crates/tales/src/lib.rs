//! TALES: the expression language used inside template directives.
//!
//! Expressions are paths (`item/title`), typed expressions (`string:`,
//! `not:`, `exists:`, `path:`), the sentinels `nothing` and `default`, and
//! opaque `host:` code handed to a [`HostEvaluator`].

pub mod ast;
pub mod engine;
pub mod error;
mod parser;
pub mod scope;
pub mod value;

// --- Public API ---
pub use ast::{Expression, Literal, Path, StringPart};
pub use engine::{
    EvaluationContext, HostEvaluator, NoHost, evaluate, resolve_path,
};
pub use error::{EvalError, TalesError};
pub use parser::{parse_expression, parse_string_template, split_arguments};
pub use scope::Scope;
pub use value::{MacroRef, Value};
