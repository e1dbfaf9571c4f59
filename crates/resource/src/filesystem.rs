//! Filesystem-based template provider.
//!
//! Import paths are resolved against a template root directory. A leading `/`
//! means "relative to the root", so `/lib/macros.pt` and `lib/macros.pt` name
//! the same file. Paths that would leave the root are rejected.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use talc_traits::{ResourceError, ResourceProvider, SharedResourceData};

/// Loads template sources from a root directory.
#[derive(Debug)]
pub struct FilesystemResourceProvider {
    root: PathBuf,
    /// Canonicalized root for containment checks
    canonical_root: Option<PathBuf>,
}

impl FilesystemResourceProvider {
    /// Creates a provider rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let canonical_root = root.canonicalize().ok();
        Self {
            root,
            canonical_root,
        }
    }

    /// Returns the template root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps an import path onto a file below the root.
    ///
    /// Returns `None` if the path would escape the root directory.
    fn resolve_path_safe(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.is_absolute() {
            return None;
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return None;
        }

        let full_path = self.root.join(relative);

        // Symlinks may still point outside the root.
        if let Ok(canonical) = full_path.canonicalize()
            && let Some(ref root) = self.canonical_root
        {
            return canonical.starts_with(root).then_some(canonical);
        }

        Some(full_path)
    }
}

impl ResourceProvider for FilesystemResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let full_path = self.resolve_path_safe(path).ok_or_else(|| {
            ResourceError::NotFound(format!("{} (outside template root)", path))
        })?;
        log::debug!("Loading template '{}' from {}", path, full_path.display());

        std::fs::read(&full_path).map(Arc::new).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound(path.to_string())
            } else {
                ResourceError::LoadFailed {
                    path: path.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path_safe(path)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "FilesystemResourceProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_filesystem_provider_loads_template_text() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("page.pt"), "<p>Hello</p>").unwrap();

        let provider = FilesystemResourceProvider::new(dir.path());
        assert_eq!(provider.load_text("page.pt").unwrap(), "<p>Hello</p>");
    }

    #[test]
    fn test_filesystem_provider_root_relative_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib").join("macros.pt"), "macros").unwrap();

        let provider = FilesystemResourceProvider::new(dir.path());
        assert!(provider.exists("lib/macros.pt"));
        assert!(provider.exists("/lib/macros.pt"));
        assert_eq!(provider.load_text("/lib/macros.pt").unwrap(), "macros");
    }

    #[test]
    fn test_filesystem_provider_not_found() {
        let dir = tempdir().unwrap();
        let provider = FilesystemResourceProvider::new(dir.path());

        let result = provider.load("missing.pt");
        assert!(matches!(result, Err(ResourceError::NotFound(_))));
    }

    #[test]
    fn test_filesystem_provider_blocks_traversal() {
        let dir = tempdir().unwrap();
        let provider = FilesystemResourceProvider::new(dir.path());

        assert!(provider.load("../../../etc/passwd").is_err());
        assert!(!provider.exists(".."));
        assert!(!provider.exists("lib/../../secret.pt"));
    }

    #[test]
    fn test_filesystem_provider_directories_do_not_exist_as_templates() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();

        let provider = FilesystemResourceProvider::new(dir.path());
        assert!(!provider.exists("lib"));
    }
}
