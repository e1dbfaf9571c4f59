//! ResourceProvider trait for abstracting template source loading.
//!
//! The compiler resolves `metal:import` paths through this trait so that
//! imported templates can come from disk, from memory, or from inline
//! sources supplied with a single render call.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to load resource '{path}': {message}")]
    LoadFailed { path: String, message: String },

    #[error("Invalid resource format: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::Io(err.to_string())
    }
}

/// Shared resource data type (reference-counted bytes).
pub type SharedResourceData = Arc<Vec<u8>>;

/// A source of template text addressed by path.
///
/// # Implementations
///
/// - `FilesystemResourceProvider` (talc-resource): loads from a template root directory
/// - `InMemoryResourceProvider`: pre-populated map, always available
/// - `LayeredResourceProvider`: consults several providers in order
pub trait ResourceProvider: Send + Sync + Debug {
    /// Load a resource by its path.
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError>;

    /// Check if a resource exists.
    fn exists(&self, path: &str) -> bool;

    /// Load a resource and decode it as UTF-8 template text.
    fn load_text(&self, path: &str) -> Result<String, ResourceError> {
        let data = self.load(path)?;
        String::from_utf8(data.to_vec())
            .map_err(|e| ResourceError::InvalidFormat(format!("{}: {}", path, e)))
    }

    /// Returns a human-readable name for this provider (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// An in-memory resource provider.
///
/// Used for inline imports passed alongside a template body and for tests.
#[derive(Debug, Default)]
pub struct InMemoryResourceProvider {
    resources: RwLock<HashMap<String, SharedResourceData>>,
}

impl InMemoryResourceProvider {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a provider from `(path, template text)` pairs.
    pub fn from_sources<I, K, V>(sources: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let resources = sources
            .into_iter()
            .map(|(path, text)| (path.into(), Arc::new(text.into().into_bytes())))
            .collect();
        Self {
            resources: RwLock::new(resources),
        }
    }

    /// Add a resource to the in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::LoadFailed` if the internal lock is poisoned.
    pub fn add(&self, path: impl Into<String>, data: Vec<u8>) -> Result<(), ResourceError> {
        let path_string = path.into();
        let mut resources = self
            .resources
            .write()
            .map_err(|_| ResourceError::LoadFailed {
                path: path_string.clone(),
                message: "resource store lock poisoned".to_string(),
            })?;
        resources.insert(path_string, Arc::new(data));
        Ok(())
    }

    /// Add template text under `path`.
    pub fn add_text(&self, path: impl Into<String>, text: &str) -> Result<(), ResourceError> {
        self.add(path, text.as_bytes().to_vec())
    }

    /// Number of stored templates; 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.resources.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.read().map(|r| r.is_empty()).unwrap_or(true)
    }
}

impl ResourceProvider for InMemoryResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let resources = self
            .resources
            .read()
            .map_err(|_| ResourceError::LoadFailed {
                path: path.to_string(),
                message: "resource store lock poisoned".to_string(),
            })?;
        resources
            .get(path)
            .or_else(|| resources.get(path.trim_start_matches('/')))
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.resources
            .read()
            .map(|r| r.contains_key(path) || r.contains_key(path.trim_start_matches('/')))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "InMemoryResourceProvider"
    }
}

/// Consults a list of providers in order; the first one holding a path wins.
///
/// Inline imports supplied with a render request are layered over the
/// provider configured on the cache this way.
#[derive(Debug, Clone, Default)]
pub struct LayeredResourceProvider {
    layers: Vec<Arc<dyn ResourceProvider>>,
}

impl LayeredResourceProvider {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Adds a layer consulted after every existing one.
    pub fn with_layer(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.layers.push(provider);
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl ResourceProvider for LayeredResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        for layer in &self.layers {
            match layer.load(path) {
                Err(ResourceError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(ResourceError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.layers.iter().any(|layer| layer.exists(path))
    }

    fn name(&self) -> &'static str {
        "LayeredResourceProvider"
    }
}
