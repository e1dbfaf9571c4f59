//! One-call entry points backed by a process-wide in-memory cache.

use crate::cache::{CompileOptions, TemplateCache};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;
use talc_tales::Value;
use talc_template_core::{CompiledTemplate, TemplateError};

static DEFAULT_CACHE: OnceLock<Result<TemplateCache, String>> = OnceLock::new();

/// The process-wide cache used by [`compile_template`] and [`render_template`].
pub fn default_cache() -> Result<&'static TemplateCache, TemplateError> {
    DEFAULT_CACHE
        .get_or_init(|| TemplateCache::builder().build().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|message| TemplateError::config(message.clone()))
}

/// Compiles `body`, reusing an earlier compilation with the same key.
pub fn compile_template(
    body: &str,
    global_types: &BTreeMap<String, String>,
    dependencies: &BTreeSet<String>,
) -> Result<CompiledTemplate, TemplateError> {
    let options = CompileOptions {
        global_types: global_types.clone(),
        dependencies: dependencies.clone(),
        ..CompileOptions::default()
    };
    default_cache()?.compile(body, &options)
}

/// Compiles (or reuses) `body` and renders it with `globals`.
///
/// `imports` maps import paths to template text for this call.
pub fn render_template(
    body: &str,
    globals: &HashMap<String, Value>,
    imports: Option<&BTreeMap<String, String>>,
    dependencies: Option<&BTreeSet<String>>,
) -> Result<String, TemplateError> {
    let options = CompileOptions {
        imports: imports.cloned().unwrap_or_default(),
        dependencies: dependencies.cloned().unwrap_or_default(),
        ..CompileOptions::default()
    };
    default_cache()?.render(body, globals, &options)
}
