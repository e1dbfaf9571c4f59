use super::storage::{CacheStorage, FileStorage, MemoryStorage};
use crate::error::CacheError;
use std::path::PathBuf;

/// Selects where compiled programs are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StorageConfig {
    /// Programs live for the lifetime of the cache. (Default)
    #[default]
    Memory,
    /// One JSON artifact per key in `directory`, named by `pattern`.
    /// The pattern must contain `{key}` exactly once.
    Filesystem { directory: PathBuf, pattern: String },
}

impl StorageConfig {
    pub fn filesystem(directory: impl Into<PathBuf>) -> Self {
        StorageConfig::Filesystem {
            directory: directory.into(),
            pattern: FileStorage::DEFAULT_PATTERN.to_string(),
        }
    }

    pub(crate) fn open(&self) -> Result<Box<dyn CacheStorage>, CacheError> {
        match self {
            StorageConfig::Memory => Ok(Box::new(MemoryStorage)),
            StorageConfig::Filesystem { directory, pattern } => {
                Ok(Box::new(FileStorage::new(directory.clone(), pattern)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_selects_backend() {
        assert_eq!(StorageConfig::default().open().unwrap().name(), "memory");
        let storage = StorageConfig::filesystem("/tmp/talc").open().unwrap();
        assert_eq!(storage.name(), "filesystem");
    }

    #[test]
    fn test_open_validates_pattern() {
        let config = StorageConfig::Filesystem {
            directory: "/tmp/talc".into(),
            pattern: "no-placeholder.json".into(),
        };
        assert!(matches!(
            config.open(),
            Err(CacheError::InvalidPattern { .. })
        ));
    }
}
