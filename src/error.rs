use talc_template_core::TemplateError;
use thiserror::Error;

/// Failures of a cache storage backend.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Template cache lock was poisoned")]
    LockPoisoned,
}

impl From<CacheError> for TemplateError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io(e) => TemplateError::Io(e),
            other => TemplateError::Config(other.to_string()),
        }
    }
}
