//! The compiled-program cache.
//!
//! Templates are keyed by a digest over their text, mode and filename, the
//! text of every template they import, their declared globals and their
//! dependencies. Imports are loaded once per request; the key and any
//! compilation both read that snapshot. Per cache, one critical section
//! spans lookup, compilation and insertion, so each key is compiled at most
//! once.

pub mod builder;
pub mod config;
pub mod storage;

pub use builder::TemplateCacheBuilder;
pub use config::StorageConfig;
pub use storage::{CacheStorage, FileStorage, MemoryStorage};

use crate::error::CacheError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use talc_compiler::{Compiler, ImportedSource, TemplateMode};
use talc_tales::Value;
use talc_template_core::{
    CodeBackend, CompiledProgram, CompiledTemplate, GENERATOR_VERSION, KeyInputs, TemplateError,
    TemplateKey,
};
use talc_traits::{InMemoryResourceProvider, LayeredResourceProvider, ResourceProvider};

/// Per-request inputs that, together with the template text, form the key.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub filename: Option<String>,
    pub global_types: BTreeMap<String, String>,
    pub dependencies: BTreeSet<String>,
    /// Import sources supplied inline, consulted before the cache's provider.
    pub imports: BTreeMap<String, String>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_global(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.global_types.insert(name.into(), type_name.into());
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }

    pub fn with_import(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.imports.insert(path.into(), source.into());
        self
    }
}

struct CacheState {
    storage: Box<dyn CacheStorage>,
    entries: HashMap<TemplateKey, CompiledTemplate>,
    recovered: bool,
}

impl CacheState {
    /// Loads artifacts left by earlier processes, once.
    fn ensure_recovered(&mut self, backend: &dyn CodeBackend) -> Result<(), TemplateError> {
        if self.recovered {
            return Ok(());
        }
        self.recovered = true;
        for program in self.storage.recover()? {
            let key = program.key.clone();
            match backend.compile(&program) {
                Ok(procedure) => {
                    let template = CompiledTemplate::new(Arc::new(program), procedure);
                    self.entries.insert(key, template);
                }
                Err(e) => log::warn!("Discarding recovered template {}: {}", key, e),
            }
        }
        Ok(())
    }
}

/// Compiles templates once per key and hands out shared compiled templates.
pub struct TemplateCache {
    mode: TemplateMode,
    backend: Arc<dyn CodeBackend>,
    resources: Arc<dyn ResourceProvider>,
    default_dependencies: BTreeSet<String>,
    state: Mutex<CacheState>,
}

impl fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCache")
            .field("mode", &self.mode)
            .field("backend", &self.backend.name())
            .field("resources", &self.resources.name())
            .field("default_dependencies", &self.default_dependencies)
            .finish_non_exhaustive()
    }
}

impl TemplateCache {
    /// A builder with in-memory storage and the interpreting backend.
    pub fn builder() -> TemplateCacheBuilder {
        TemplateCacheBuilder::new()
    }

    pub(crate) fn from_parts(
        mode: TemplateMode,
        backend: Arc<dyn CodeBackend>,
        resources: Arc<dyn ResourceProvider>,
        default_dependencies: BTreeSet<String>,
        storage: Box<dyn CacheStorage>,
    ) -> Self {
        log::debug!(
            "Template cache using {} storage and the {} backend",
            storage.name(),
            backend.name()
        );
        Self {
            mode,
            backend,
            resources,
            default_dependencies,
            state: Mutex::new(CacheState {
                storage,
                entries: HashMap::new(),
                recovered: false,
            }),
        }
    }

    fn compiler_for(&self, options: &CompileOptions) -> Compiler {
        let resources: Arc<dyn ResourceProvider> = if options.imports.is_empty() {
            self.resources.clone()
        } else {
            let inline = InMemoryResourceProvider::from_sources(
                options.imports.iter().map(|(p, s)| (p.clone(), s.clone())),
            );
            Arc::new(
                LayeredResourceProvider::new()
                    .with_layer(Arc::new(inline))
                    .with_layer(self.resources.clone()),
            )
        };
        Compiler::new(resources).with_mode(self.mode)
    }

    fn dependencies_for(&self, options: &CompileOptions) -> BTreeSet<String> {
        self.default_dependencies
            .union(&options.dependencies)
            .cloned()
            .collect()
    }

    /// Loads the imports of `source` and derives its key from them.
    fn derive_key(
        &self,
        compiler: &Compiler,
        source: &str,
        options: &CompileOptions,
        dependencies: &BTreeSet<String>,
    ) -> Result<(TemplateKey, Vec<ImportedSource>), TemplateError> {
        let imports = compiler.import_sources(source, options.filename.as_deref())?;
        let texts: Vec<String> = imports.iter().map(|i| i.text.clone()).collect();
        let key = TemplateKey::derive(&KeyInputs {
            template: source,
            mode: self.mode,
            filename: options.filename.as_deref(),
            imports: &texts,
            global_types: &options.global_types,
            dependencies,
        });
        Ok((key, imports))
    }

    /// The key `source` would be cached under with `options`.
    pub fn key_for(&self, source: &str, options: &CompileOptions) -> Result<TemplateKey, TemplateError> {
        let compiler = self.compiler_for(options);
        let dependencies = self.dependencies_for(options);
        let (key, _) = self.derive_key(&compiler, source, options, &dependencies)?;
        Ok(key)
    }

    /// Returns the compiled template for `source`, compiling it on a miss.
    pub fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompiledTemplate, TemplateError> {
        let compiler = self.compiler_for(options);
        let dependencies = self.dependencies_for(options);
        let (key, imports) = self.derive_key(&compiler, source, options, &dependencies)?;

        let mut state = self.state.lock().map_err(|_| CacheError::LockPoisoned)?;
        state.ensure_recovered(self.backend.as_ref())?;
        if let Some(template) = state.entries.get(&key) {
            log::debug!("Template cache hit for {}", key);
            return Ok(template.clone());
        }

        log::info!("Template cache miss for {}; compiling", key);
        let program = compiler
            .with_snapshot(&imports)
            .compile(source, options.filename.as_deref())?;
        let compiled = Arc::new(CompiledProgram {
            key: key.clone(),
            program,
            generator_version: GENERATOR_VERSION.to_string(),
            global_types: options.global_types.clone(),
            dependencies,
        });
        let procedure = self.backend.compile(&compiled)?;
        if let Err(e) = state.storage.persist(&compiled) {
            log::warn!("Could not persist compiled template {}: {}", key, e);
        }
        let template = CompiledTemplate::new(compiled, procedure);
        state.entries.insert(key, template.clone());
        Ok(template)
    }

    /// Compiles (or reuses) `source` and renders it with `globals`.
    ///
    /// Every global name is declared with type `any` unless `options`
    /// already declares it.
    pub fn render(
        &self,
        source: &str,
        globals: &HashMap<String, Value>,
        options: &CompileOptions,
    ) -> Result<String, TemplateError> {
        let mut options = options.clone();
        for name in globals.keys() {
            options
                .global_types
                .entry(name.clone())
                .or_insert_with(|| "any".to_string());
        }
        let template = self.compile(source, &options)?;
        Ok(template.render(globals)?)
    }

    pub fn contains(&self, key: &TemplateKey) -> bool {
        self.state
            .lock()
            .map(|state| state.entries.contains_key(key))
            .unwrap_or(false)
    }

    /// Number of compiled templates held in memory.
    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
