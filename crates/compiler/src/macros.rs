//! Macro registry: `define-macro` definitions and `import` namespaces.
//!
//! Every template taking part in a compilation is a unit. The main template
//! is unit 0; imported templates are loaded once per resolved path. Each
//! unit has its own namespaces (alias to macro name to definition id), so
//! macros keep resolving names the way their defining template sees them.

use crate::arguments::parse_imports;
use crate::command::{CommandSet, MetalKind};
use crate::imports::{MAX_IMPORT_DEPTH, resolve_uri};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use talc_markup::{Document, Element, Location, Node, parse};
use talc_tales::Expression;
use talc_template_core::TemplateError;
use talc_traits::ResourceProvider;

pub type Namespaces = BTreeMap<String, BTreeMap<String, usize>>;

/// A `define-macro` element and the unit it belongs to.
#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub name: String,
    pub unit: usize,
    pub element: Element,
    pub location: Location,
}

#[derive(Debug, Clone, Default)]
struct Unit {
    path: Option<String>,
    namespaces: Namespaces,
}

pub struct MacroRegistry {
    resources: Arc<dyn ResourceProvider>,
    units: Vec<Unit>,
    definitions: Vec<MacroDefinition>,
    by_path: HashMap<String, usize>,
    resolving: Vec<String>,
    definition_at: HashMap<(usize, usize), usize>,
}

impl std::fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacroRegistry")
            .field("units", &self.units.len())
            .field("definitions", &self.definitions.len())
            .finish()
    }
}

impl MacroRegistry {
    pub fn new(resources: Arc<dyn ResourceProvider>) -> Self {
        Self {
            resources,
            units: Vec::new(),
            definitions: Vec::new(),
            by_path: HashMap::new(),
            resolving: Vec::new(),
            definition_at: HashMap::new(),
        }
    }

    /// Registers the main template and, transitively, everything it imports.
    pub fn register_main(
        &mut self,
        document: &Document,
        path: Option<&str>,
    ) -> Result<usize, TemplateError> {
        if let Some(path) = path {
            self.resolving.push(path.to_string());
        }
        let result = self.register_unit(document, path, 0);
        if path.is_some() {
            self.resolving.pop();
        }
        result
    }

    fn register_unit(
        &mut self,
        document: &Document,
        path: Option<&str>,
        depth: usize,
    ) -> Result<usize, TemplateError> {
        let unit = self.units.len();
        self.units.push(Unit {
            path: path.map(str::to_string),
            namespaces: Namespaces::new(),
        });
        if let Some(path) = path {
            self.by_path.insert(path.to_string(), unit);
        }

        let mut imports = Vec::new();
        let mut macros = Vec::new();
        collect_directives(&document.nodes, &mut imports, &mut macros)?;

        let mut namespaces = Namespaces::new();
        namespaces.insert(String::new(), BTreeMap::new());

        for (argument, location) in imports {
            for entry in parse_imports(&argument) {
                let target = resolve_uri(&entry.path, path);
                let imported = self.import(&target, &location, depth + 1)?;
                let exported = self.units[imported]
                    .namespaces
                    .get("")
                    .cloned()
                    .unwrap_or_default();
                log::debug!(
                    "Imported {} macro(s) from '{}' into namespace '{}'",
                    exported.len(),
                    target,
                    entry.alias
                );
                namespaces.entry(entry.alias).or_default().extend(exported);
            }
        }

        let mut local: BTreeMap<String, usize> = BTreeMap::new();
        for (name, element) in macros {
            let location = element.location().clone();
            if name.is_empty() {
                return Err(TemplateError::macro_resolution(
                    "metal:define-macro requires a name",
                    &location,
                ));
            }
            if local.contains_key(&name) {
                return Err(TemplateError::macro_resolution(
                    format!("duplicate macro '{}'", name),
                    &location,
                ));
            }
            let id = self.definitions.len();
            log::debug!("Registered macro '{}' (#{}) at {}", name, id, location);
            self.definition_at.insert((unit, location.offset), id);
            self.definitions.push(MacroDefinition {
                name: name.clone(),
                unit,
                element,
                location,
            });
            local.insert(name, id);
        }
        namespaces.entry(String::new()).or_default().extend(local);

        self.units[unit].namespaces = namespaces;
        Ok(unit)
    }

    fn import(
        &mut self,
        target: &str,
        location: &Location,
        depth: usize,
    ) -> Result<usize, TemplateError> {
        if depth > MAX_IMPORT_DEPTH {
            return Err(TemplateError::macro_resolution(
                format!("maximum import depth ({}) exceeded", MAX_IMPORT_DEPTH),
                location,
            ));
        }
        if self.resolving.iter().any(|p| p == target) {
            return Err(TemplateError::macro_resolution(
                format!("circular import of '{}'", target),
                location,
            ));
        }
        if let Some(&unit) = self.by_path.get(target) {
            return Ok(unit);
        }

        let text = self.resources.load_text(target)?;
        let document = parse(&text, Some(target))?;
        self.resolving.push(target.to_string());
        let result = self.register_unit(&document, Some(target), depth);
        self.resolving.pop();
        result
    }

    pub fn definitions(&self) -> &[MacroDefinition] {
        &self.definitions
    }

    pub fn namespaces(&self, unit: usize) -> Namespaces {
        self.units
            .get(unit)
            .map(|u| u.namespaces.clone())
            .unwrap_or_default()
    }

    pub fn unit_path(&self, unit: usize) -> Option<&str> {
        self.units.get(unit).and_then(|u| u.path.as_deref())
    }

    /// The definition registered for the `define-macro` element at `offset`.
    pub fn definition_at(&self, unit: usize, offset: usize) -> Option<usize> {
        self.definition_at.get(&(unit, offset)).copied()
    }

    /// Resolves `macros/NAME` and `ALIAS/macros/NAME` at compile time.
    ///
    /// Returns `Ok(None)` for expressions that can only be resolved while
    /// rendering.
    pub fn resolve_static(
        &self,
        unit: usize,
        expression: &Expression,
        location: &Location,
    ) -> Result<Option<usize>, TemplateError> {
        let Some(path) = expression.as_path() else {
            return Ok(None);
        };
        let Some(unit_data) = self.units.get(unit) else {
            return Ok(None);
        };
        let (alias, name) = match path.segments.as_slice() {
            [name] if path.root == "macros" => ("", name),
            [macros, name] if macros == "macros" && !path.root.is_empty() => {
                if !unit_data.namespaces.contains_key(&path.root) {
                    return Ok(None);
                }
                (path.root.as_str(), name)
            }
            _ => return Ok(None),
        };
        match unit_data.namespaces.get(alias).and_then(|ns| ns.get(name)) {
            Some(&id) => Ok(Some(id)),
            None if alias.is_empty() => Err(TemplateError::macro_resolution(
                format!("unknown macro '{}'", name),
                location,
            )),
            None => Err(TemplateError::macro_resolution(
                format!("unknown macro '{}' in namespace '{}'", name, alias),
                location,
            )),
        }
    }
}

/// Gathers `import` arguments and `define-macro` elements in document order.
fn collect_directives(
    nodes: &[Node],
    imports: &mut Vec<(String, Location)>,
    macros: &mut Vec<(String, Element)>,
) -> Result<(), TemplateError> {
    for node in nodes {
        let Node::Element(element) = node else {
            continue;
        };
        let commands = CommandSet::extract(element)?;
        if let Some(import) = commands.metal(MetalKind::Import) {
            imports.push((import.argument.clone(), import.location.clone()));
        }
        if let Some(define) = commands.metal(MetalKind::DefineMacro) {
            macros.push((define.argument.trim().to_string(), element.clone()));
        }
        collect_directives(&element.children, imports, macros)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use talc_tales::parse_expression;
    use talc_traits::InMemoryResourceProvider;

    fn registry(sources: &[(&str, &str)]) -> MacroRegistry {
        MacroRegistry::new(Arc::new(InMemoryResourceProvider::from_sources(
            sources.iter().map(|(p, t)| (p.to_string(), t.to_string())),
        )))
    }

    fn register(registry: &mut MacroRegistry, source: &str) -> Result<usize, TemplateError> {
        let document = parse(source, None)?;
        registry.register_main(&document, None)
    }

    #[test]
    fn test_registers_nested_macros_independently() {
        let mut reg = registry(&[]);
        let unit = register(
            &mut reg,
            r#"<div metal:define-macro="outer"><p metal:define-macro="inner">x</p></div>"#,
        )
        .unwrap();
        let ns = reg.namespaces(unit);
        assert_eq!(ns[""].len(), 2);
        assert_eq!(reg.definitions()[ns[""]["inner"]].element.name().local, "p");
    }

    #[test]
    fn test_duplicate_macro_is_error() {
        let mut reg = registry(&[]);
        let err = register(
            &mut reg,
            r#"<a metal:define-macro="m"/><b metal:define-macro="m"/>"#,
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::MacroResolution { .. }));
    }

    #[test]
    fn test_imports_merge_and_locals_override() {
        let mut reg = registry(&[
            ("lib.pt", r#"<a metal:define-macro="m"/><b metal:define-macro="shared"/>"#),
            ("ui.pt", r#"<c metal:define-macro="card"/>"#),
        ]);
        let unit = register(
            &mut reg,
            r#"<html metal:import="lib.pt; ui:ui.pt"><i metal:define-macro="m"/></html>"#,
        )
        .unwrap();
        let ns = reg.namespaces(unit);
        assert_eq!(reg.definitions()[ns[""]["m"]].unit, unit);
        assert!(ns[""].contains_key("shared"));
        assert!(ns["ui"].contains_key("card"));
    }

    #[test]
    fn test_circular_import_is_error() {
        let mut reg = registry(&[
            ("a.pt", r#"<p metal:import="b.pt"/>"#),
            ("b.pt", r#"<p metal:import="a.pt"/>"#),
        ]);
        let err = register(&mut reg, r#"<p metal:import="a.pt"/>"#).unwrap_err();
        assert!(err.to_string().contains("circular import of 'a.pt'"));
    }

    #[test]
    fn test_resolve_static_forms() {
        let mut reg = registry(&[("ui.pt", r#"<c metal:define-macro="card"/>"#)]);
        let unit = register(
            &mut reg,
            r#"<p metal:import="ui:ui.pt" metal:define-macro="page"/>"#,
        )
        .unwrap();
        let loc = Location::default();
        let resolve = |text: &str| reg.resolve_static(unit, &parse_expression(text).unwrap(), &loc);

        assert!(resolve("macros/page").unwrap().is_some());
        assert!(resolve("ui/macros/card").unwrap().is_some());
        assert!(resolve("chosen").unwrap().is_none());
        assert!(resolve("other/macros/card").unwrap().is_none());
        assert!(matches!(
            resolve("macros/missing"),
            Err(TemplateError::MacroResolution { .. })
        ));
    }
}
