//! Where compiled programs live between processes.

use crate::error::CacheError;
use std::fmt::Debug;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use talc_template_core::{CompiledProgram, GENERATOR_VERSION, TemplateKey};
use tempfile::NamedTempFile;

pub const KEY_PLACEHOLDER: &str = "{key}";

/// A storage backend for compiled programs.
///
/// # Implementations
///
/// - [`MemoryStorage`]: nothing survives the process
/// - [`FileStorage`]: one JSON artifact per key in a directory
pub trait CacheStorage: Send + Debug {
    /// Artifacts left by earlier processes. Called once, on first use.
    fn recover(&mut self) -> Result<Vec<CompiledProgram>, CacheError>;

    /// Stores a freshly compiled program.
    fn persist(&mut self, program: &CompiledProgram) -> Result<(), CacheError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStorage;

impl CacheStorage for MemoryStorage {
    fn recover(&mut self) -> Result<Vec<CompiledProgram>, CacheError> {
        Ok(Vec::new())
    }

    fn persist(&mut self, _program: &CompiledProgram) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Durable storage: `directory/<pattern with {key} substituted>`.
///
/// Recovered artifacts are keyed by the key found in their file name; the
/// key is not re-derived from the artifact's content.
#[derive(Debug, Clone)]
pub struct FileStorage {
    directory: PathBuf,
    prefix: String,
    suffix: String,
}

impl FileStorage {
    pub const DEFAULT_PATTERN: &'static str = "talc-{key}.json";

    pub fn new(directory: impl Into<PathBuf>, pattern: &str) -> Result<Self, CacheError> {
        let invalid = |message: &str| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        };
        let (prefix, suffix) = pattern
            .split_once(KEY_PLACEHOLDER)
            .ok_or_else(|| invalid("missing the {key} placeholder"))?;
        if suffix.contains(KEY_PLACEHOLDER) {
            return Err(invalid("the {key} placeholder must appear exactly once"));
        }
        if pattern.contains(['/', '\\']) {
            return Err(invalid("the pattern names a file, not a path"));
        }
        Ok(Self {
            directory: directory.into(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_name(&self, key: &TemplateKey) -> String {
        format!("{}{}{}", self.prefix, key, self.suffix)
    }

    pub fn path_for(&self, key: &TemplateKey) -> PathBuf {
        self.directory.join(self.file_name(key))
    }

    /// The key encoded in a file name produced by this pattern.
    pub fn key_from_file_name(&self, name: &str) -> Option<TemplateKey> {
        name.strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_suffix(&self.suffix))
            .and_then(TemplateKey::parse)
    }

    fn read_artifact(path: &Path) -> Result<CompiledProgram, CacheError> {
        let reader = BufReader::new(fs::File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl CacheStorage for FileStorage {
    fn recover(&mut self) -> Result<Vec<CompiledProgram>, CacheError> {
        if !self.directory.is_dir() {
            log::debug!(
                "Cache directory {} does not exist yet; nothing to recover",
                self.directory.display()
            );
            return Ok(Vec::new());
        }

        let mut recovered = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(key) = file_name.to_str().and_then(|n| self.key_from_file_name(n)) else {
                continue;
            };
            let path = entry.path();
            let mut artifact = match Self::read_artifact(&path) {
                Ok(artifact) => artifact,
                Err(e) => {
                    log::warn!("Skipping unreadable cache file {}: {}", path.display(), e);
                    continue;
                }
            };
            if artifact.generator_version != GENERATOR_VERSION {
                log::warn!(
                    "Skipping cache file {} written by generator '{}'",
                    path.display(),
                    artifact.generator_version
                );
                continue;
            }
            artifact.key = key;
            recovered.push(artifact);
        }
        log::info!(
            "Recovered {} compiled template(s) from {}",
            recovered.len(),
            self.directory.display()
        );
        Ok(recovered)
    }

    fn persist(&mut self, program: &CompiledProgram) -> Result<(), CacheError> {
        fs::create_dir_all(&self.directory)?;
        let temp = NamedTempFile::new_in(&self.directory)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, program)?;
            writer.flush()?;
        }
        let path = self.path_for(&program.key);
        temp.persist(&path).map_err(|e| CacheError::Io(e.error))?;
        log::debug!("Persisted compiled template to {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
