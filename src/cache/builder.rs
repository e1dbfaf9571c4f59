use super::TemplateCache;
use super::config::StorageConfig;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use talc_compiler::TemplateMode;
use talc_executor::InterpreterBackend;
use talc_resource::FilesystemResourceProvider;
use talc_template_core::{CodeBackend, TemplateError};
use talc_traits::{InMemoryResourceProvider, ResourceProvider};

/// A builder for creating a `TemplateCache`.
pub struct TemplateCacheBuilder {
    backend: Arc<dyn CodeBackend>,
    resources: Option<Arc<dyn ResourceProvider>>,
    template_root: Option<PathBuf>,
    storage: StorageConfig,
    mode: TemplateMode,
    dependencies: BTreeSet<String>,
}

impl Default for TemplateCacheBuilder {
    fn default() -> Self {
        Self {
            backend: Arc::new(InterpreterBackend::new()),
            resources: None,
            template_root: None,
            storage: StorageConfig::default(),
            mode: TemplateMode::default(),
            dependencies: BTreeSet::new(),
        }
    }
}

impl TemplateCacheBuilder {
    /// In-memory storage, the interpreting backend and no import sources.
    pub fn new() -> Self {
        Default::default()
    }

    /// Selects the backend that turns programs into render procedures.
    pub fn with_backend(mut self, backend: Arc<dyn CodeBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Resolves imports through `resources`.
    pub fn with_resources(mut self, resources: Arc<dyn ResourceProvider>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Resolves imports from files under `root`.
    pub fn with_template_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.template_root = Some(root.as_ref().to_path_buf());
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Keeps compiled programs in `directory`, one file per key.
    pub fn with_file_storage<P: AsRef<Path>>(self, directory: P, pattern: &str) -> Self {
        self.with_storage(StorageConfig::Filesystem {
            directory: directory.as_ref().to_path_buf(),
            pattern: pattern.to_string(),
        })
    }

    pub fn with_mode(mut self, mode: TemplateMode) -> Self {
        self.mode = mode;
        self
    }

    /// A dependency added to every compilation.
    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }

    /// Consumes the builder and creates the `TemplateCache`.
    pub fn build(self) -> Result<TemplateCache, TemplateError> {
        let resources: Arc<dyn ResourceProvider> = match (self.resources, self.template_root) {
            (Some(_), Some(_)) => {
                return Err(TemplateError::config(
                    "Both a resource provider and a template root were configured. Use one.",
                ));
            }
            (Some(resources), None) => resources,
            (None, Some(root)) => {
                if !root.is_dir() {
                    return Err(TemplateError::config(format!(
                        "Template root '{}' is not a directory",
                        root.display()
                    )));
                }
                Arc::new(FilesystemResourceProvider::new(root))
            }
            (None, None) => Arc::new(InMemoryResourceProvider::new()),
        };
        let storage = self.storage.open()?;
        Ok(TemplateCache::from_parts(
            self.mode,
            self.backend,
            resources,
            self.dependencies,
            storage,
        ))
    }
}
