//! Import path resolution and the import scan used for key derivation.

use crate::arguments::parse_imports;
use quick_xml::escape::unescape;
use std::collections::HashSet;
use std::path::Path;
use talc_markup::{METAL_NS, ScannedAttribute, scan_attributes};
use talc_template_core::TemplateError;
use talc_traits::ResourceProvider;

pub const MAX_IMPORT_DEPTH: usize = 100;

/// Resolves `href` against the path of the importing template.
pub fn resolve_uri(href: &str, base_uri: Option<&str>) -> String {
    if href.starts_with('/') || href.contains("://") {
        return href.to_string();
    }

    match base_uri {
        Some(base) => {
            let base_dir = Path::new(base).parent().unwrap_or(Path::new(""));
            normalize_path(&base_dir.join(href).to_string_lossy())
        }
        None => normalize_path(href),
    }
}

pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    if path.starts_with('/') {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

fn is_import_attribute(attribute: &ScannedAttribute) -> bool {
    if attribute.name.local != "import" {
        return false;
    }
    attribute.name.is_in(METAL_NS)
        || (attribute.element.is_in(METAL_NS) && !attribute.raw_name.contains(':'))
}

/// The import targets named by `source`, resolved against `path`, in document order.
pub fn import_targets(source: &str, path: Option<&str>) -> Result<Vec<String>, TemplateError> {
    let mut targets = Vec::new();
    for attribute in scan_attributes(source, path)? {
        if !is_import_attribute(&attribute) {
            continue;
        }
        let raw = attribute.value.as_deref().unwrap_or("");
        let value = unescape(raw).map_err(|e| {
            TemplateError::compile(
                format!("invalid entity in import: {}", e),
                Some(&attribute.location),
            )
        })?;
        targets.extend(
            parse_imports(&value)
                .into_iter()
                .map(|entry| resolve_uri(&entry.path, path)),
        );
    }
    Ok(targets)
}

/// One imported template as loaded from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSource {
    /// The resolved path the compiler will request.
    pub path: String,
    pub text: String,
}

/// Collects every template transitively imported by `source`, in visit order.
///
/// Only tokenizes and resolves namespaces; no tree or program is built.
/// Each template is visited once, so cycles terminate here and are
/// reported by the compiler instead.
pub fn collect_import_sources(
    source: &str,
    path: Option<&str>,
    provider: &dyn ResourceProvider,
) -> Result<Vec<ImportedSource>, TemplateError> {
    let mut visited = HashSet::new();
    let mut sources = Vec::new();
    if let Some(path) = path {
        visited.insert(path.to_string());
    }
    collect_into(source, path, provider, 0, &mut visited, &mut sources)?;
    Ok(sources)
}

fn collect_into(
    source: &str,
    path: Option<&str>,
    provider: &dyn ResourceProvider,
    depth: usize,
    visited: &mut HashSet<String>,
    sources: &mut Vec<ImportedSource>,
) -> Result<(), TemplateError> {
    if depth > MAX_IMPORT_DEPTH {
        return Err(TemplateError::config(format!(
            "maximum import depth ({}) exceeded",
            MAX_IMPORT_DEPTH
        )));
    }
    for target in import_targets(source, path)? {
        if !visited.insert(target.clone()) {
            continue;
        }
        let position = sources.len();
        log::trace!("Scanning import '{}'", target);
        let text = provider.load_text(&target)?;
        collect_into(&text, Some(&target), provider, depth + 1, visited, sources)?;
        sources.insert(position, ImportedSource { path: target, text });
    }
    Ok(())
}
