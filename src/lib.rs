//! talc: a TAL/METAL markup-template compiler.
//!
//! Templates compile to a portable [`Program`]. A [`CodeBackend`] turns the
//! program into something that renders, and a [`TemplateCache`] keeps the
//! result under a key derived from everything the program depends on.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use talc::{CompileOptions, TemplateCache, Value};
//!
//! let cache = TemplateCache::builder().build()?;
//! let globals = HashMap::from([("name".to_string(), Value::from("World"))]);
//! let html = cache.render(
//!     r#"<p tal:content="string:Hello, ${name}!">greeting</p>"#,
//!     &globals,
//!     &CompileOptions::new(),
//! )?;
//! assert_eq!(html, "<p>Hello, World!</p>");
//! # Ok::<(), talc::TemplateError>(())
//! ```

pub mod api;
pub mod cache;
pub mod error;

pub use api::{compile_template, default_cache, render_template};
pub use cache::{
    CacheStorage, CompileOptions, FileStorage, MemoryStorage, StorageConfig, TemplateCache,
    TemplateCacheBuilder,
};
pub use error::CacheError;

pub use talc_compiler::{Compiler, TemplateMode};
pub use talc_executor::{InterpreterBackend, LIBRARIES};
pub use talc_markup::{Location, ParseError};
pub use talc_resource::FilesystemResourceProvider;
pub use talc_tales::{EvalError, Value};
pub use talc_template_core::{
    CodeBackend, CompiledProgram, CompiledTemplate, DefaultFormatter, GENERATOR_VERSION, Program,
    RenderError, RenderErrorKind, RenderProcedure, TemplateError, TemplateKey, ValueFormatter,
};
pub use talc_traits::{
    InMemoryResourceProvider, LayeredResourceProvider, ResourceError, ResourceProvider,
    SharedResourceData,
};
