#![allow(dead_code)]

use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use talc::{
    CompileOptions, InMemoryResourceProvider, TemplateCache, TemplateError, TemplateKey,
    TemplateMode, Value,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Globals from a JSON object literal.
pub fn globals(json: Json) -> HashMap<String, Value> {
    match json {
        Json::Object(members) => members
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect(),
        _ => HashMap::new(),
    }
}

/// A fresh in-memory cache resolving imports from `sources`.
pub fn cache_with_sources(sources: &[(&str, &str)]) -> Result<TemplateCache, TemplateError> {
    let provider = InMemoryResourceProvider::from_sources(sources.iter().copied());
    TemplateCache::builder()
        .with_resources(Arc::new(provider))
        .build()
}

/// Renders `template` in a fresh cache.
pub fn render(template: &str, json: Json) -> Result<String, TemplateError> {
    render_with_imports(template, &[], json)
}

pub fn render_with_imports(
    template: &str,
    sources: &[(&str, &str)],
    json: Json,
) -> Result<String, TemplateError> {
    init_logger();
    let cache = cache_with_sources(sources)?;
    cache.render(
        template,
        &globals(json),
        &CompileOptions::new().with_filename("page.pt"),
    )
}

/// Key inputs varied one at a time by the cache-key sensitivity tests.
pub struct KeyCase {
    pub template: String,
    pub mode: TemplateMode,
    pub filename: String,
    pub globals: BTreeMap<String, String>,
    pub dependencies: BTreeSet<String>,
    pub sources: Vec<(String, String)>,
}

impl KeyCase {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            mode: TemplateMode::Markup,
            filename: "page.pt".to_string(),
            globals: BTreeMap::new(),
            dependencies: BTreeSet::new(),
            sources: Vec::new(),
        }
    }

    pub fn key(&self) -> Result<TemplateKey, TemplateError> {
        let provider = InMemoryResourceProvider::from_sources(self.sources.iter().cloned());
        let cache = TemplateCache::builder()
            .with_resources(Arc::new(provider))
            .with_mode(self.mode)
            .build()?;
        let options = CompileOptions {
            filename: Some(self.filename.clone()),
            global_types: self.globals.clone(),
            dependencies: self.dependencies.clone(),
            ..CompileOptions::default()
        };
        cache.key_for(&self.template, &options)
    }
}
