//! Core abstractions shared by the talc compiler and its backends.
//!
//! ## Key Abstractions
//!
//! - **`Program`**: the portable operation sequence produced by the compiler
//! - **`TemplateKey`**: digest over a template and everything it depends on
//! - **`CodeBackend`** / **`RenderProcedure`**: turn a program into something that renders
//! - **`TemplateError`** / **`RenderError`**: errors surfaced to callers

pub mod backend;
pub mod error;
pub mod key;
pub mod program;

pub use backend::{
    CodeBackend, CompiledProgram, CompiledTemplate, DefaultFormatter, RenderProcedure,
    ValueFormatter,
};
pub use error::{RenderError, RenderErrorKind, TemplateError};
pub use key::{KeyInputs, TemplateKey, TemplateMode};
pub use program::{
    AttributeRewrite, Block, DefineKind, Expr, MacroBlock, MacroTarget, Omit, Operation,
    ParamFill, ParamSpec, ParamValue, Program, SlotFill, StaticAttribute, TagOp, TypeTag,
};

/// Stamp written into every compiled program; artifacts from another
/// generator version are not reused.
pub const GENERATOR_VERSION: &str = concat!("talc-", env!("CARGO_PKG_VERSION"), "/program-1");
