//! TAL/METAL compiler.
//!
//! Turns template source into a portable [`Program`]:
//!
//! 1. the markup front end builds a tag tree
//! 2. the [`MacroRegistry`] loads imports and registers macro definitions
//! 3. the program builder walks every tree in document order, emitting
//!    operation blocks for the main template and each macro body

pub mod arguments;
pub mod command;
mod compiler;
mod compiler_handlers;
pub mod imports;
pub mod macros;

pub use command::{Command, CommandSet, MetalKind, TalKind};
pub use imports::{ImportedSource, collect_import_sources, import_targets, resolve_uri};
pub use macros::{MacroDefinition, MacroRegistry};

use crate::arguments::parse_define_param;
use crate::compiler::ProgramBuilder;
use std::sync::Arc;
use talc_markup::{Element, Node, parse, parse_text};
use talc_template_core::{MacroBlock, Operation, ParamSpec, Program, TemplateError};
pub use talc_template_core::TemplateMode;
use talc_traits::{InMemoryResourceProvider, ResourceProvider};

#[derive(Debug, Clone)]
pub struct Compiler {
    resources: Arc<dyn ResourceProvider>,
    mode: TemplateMode,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryResourceProvider::new()))
    }
}

impl Compiler {
    /// A compiler resolving imports through `resources`.
    pub fn new(resources: Arc<dyn ResourceProvider>) -> Self {
        Self {
            resources,
            mode: TemplateMode::Markup,
        }
    }

    pub fn with_mode(mut self, mode: TemplateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> TemplateMode {
        self.mode
    }

    /// A compiler of the same mode whose imports resolve only to `imports`.
    pub fn with_snapshot(&self, imports: &[ImportedSource]) -> Compiler {
        let snapshot = InMemoryResourceProvider::from_sources(
            imports.iter().map(|i| (i.path.clone(), i.text.clone())),
        );
        Compiler::new(Arc::new(snapshot)).with_mode(self.mode)
    }

    pub fn compile(&self, source: &str, filename: Option<&str>) -> Result<Program, TemplateError> {
        if self.mode == TemplateMode::Text {
            let document = parse_text(source, filename);
            let body = document
                .nodes
                .iter()
                .map(|node| {
                    let mut text = String::new();
                    node.write_source(&mut text);
                    Operation::EmitLiteral(text)
                })
                .filter(|op| !matches!(op, Operation::EmitLiteral(t) if t.is_empty()))
                .collect();
            return Ok(Program {
                body,
                ..Program::default()
            });
        }

        log::debug!("Parsing template {}", filename.unwrap_or("<inline>"));
        let document = parse(source, filename)?;

        let mut registry = MacroRegistry::new(self.resources.clone());
        let main = registry.register_main(&document, filename)?;

        let params = registry
            .definitions()
            .iter()
            .map(|definition| declared_params(&definition.element))
            .collect::<Result<Vec<_>, _>>()?;

        let mut macros = Vec::with_capacity(params.len());
        for (definition, params_for_macro) in registry.definitions().iter().zip(&params) {
            let builder = ProgramBuilder::new(
                &registry,
                &params,
                definition.unit,
                Some(definition.location.offset),
            );
            macros.push(MacroBlock {
                name: definition.name.clone(),
                template: registry
                    .unit_path(definition.unit)
                    .filter(|_| definition.unit != main)
                    .map(str::to_string),
                params: params_for_macro.clone(),
                body: builder.build_element(&definition.element)?,
                location: definition.location.clone(),
            });
        }

        let builder = ProgramBuilder::new(&registry, &params, main, None);
        let body = builder.build_nodes(&document.nodes)?;
        log::debug!(
            "Compiled {} operation(s) and {} macro(s)",
            body.len(),
            macros.len()
        );

        Ok(Program {
            body,
            macros,
            namespaces: registry.namespaces(main),
        })
    }

    /// Every template transitively imported by `source`, loaded once.
    pub fn import_sources(
        &self,
        source: &str,
        filename: Option<&str>,
    ) -> Result<Vec<ImportedSource>, TemplateError> {
        if self.mode == TemplateMode::Text {
            return Ok(Vec::new());
        }
        collect_import_sources(source, filename, self.resources.as_ref())
    }
}

/// `define-param` declarations on a macro element and its descendants,
/// excluding nested macro definitions.
fn declared_params(element: &Element) -> Result<Vec<ParamSpec>, TemplateError> {
    let mut params: Vec<ParamSpec> = Vec::new();
    collect_params(element, true, &mut params)?;
    Ok(params)
}

fn collect_params(
    element: &Element,
    is_root: bool,
    params: &mut Vec<ParamSpec>,
) -> Result<(), TemplateError> {
    let commands = CommandSet::extract(element)?;
    if !is_root && commands.metal(MetalKind::DefineMacro).is_some() {
        return Ok(());
    }
    if let Some(declaration) = commands.metal(MetalKind::DefineParam) {
        for param in parse_define_param(&declaration.argument, &declaration.location)? {
            if params.iter().any(|p| p.name == param.name) {
                return Err(TemplateError::compile(
                    format!("duplicate parameter '{}'", param.name),
                    Some(&declaration.location),
                ));
            }
            params.push(param);
        }
    }
    for child in &element.children {
        if let Node::Element(child) = child {
            collect_params(child, false, params)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_mode_is_literal_only() {
        let program = Compiler::default()
            .with_mode(TemplateMode::Text)
            .compile("<p tal:content=\"x\">${name}</p>", None)
            .unwrap();
        assert_eq!(
            program.body,
            vec![Operation::EmitLiteral("<p tal:content=\"x\">${name}</p>".into())]
        );
    }

    #[test]
    fn test_parse_errors_surface() {
        let err = Compiler::default().compile("<a></b>", None).unwrap_err();
        assert!(matches!(err, TemplateError::Parse(_)));
    }

    #[test]
    fn test_macro_params_skip_nested_definitions() {
        let program = Compiler::default()
            .compile(
                r#"<div metal:define-macro="outer" metal:define-param="int a"><p metal:define-param="bool b"/><i metal:define-macro="inner" metal:define-param="str c"/></div>"#,
                None,
            )
            .unwrap();
        let outer: Vec<&str> = program.macros[0].params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(outer, vec!["a", "b"]);
        assert_eq!(program.macros[1].params[0].name, "c");
    }

    #[test]
    fn test_import_sources_follow_provider() {
        let provider = InMemoryResourceProvider::from_sources([("lib.pt", "<b/>")]);
        let compiler = Compiler::new(Arc::new(provider));
        let sources = compiler
            .import_sources(r#"<p metal:import="lib.pt"/>"#, None)
            .unwrap();
        assert_eq!(
            sources,
            vec![ImportedSource {
                path: "lib.pt".into(),
                text: "<b/>".into(),
            }]
        );
    }

    #[test]
    fn test_snapshot_compiles_without_the_original_provider() {
        let provider = InMemoryResourceProvider::from_sources([(
            "lib.pt",
            r#"<b metal:define-macro="m">lib</b>"#,
        )]);
        let compiler = Compiler::new(Arc::new(provider));
        let source = r#"<tal:block metal:import="lib:lib.pt"/><i metal:use-macro="lib/macros/m"/>"#;
        let mut sources = compiler.import_sources(source, None).unwrap();
        sources[0].text = r#"<u metal:define-macro="m">snapshot</u>"#.into();

        let program = compiler.with_snapshot(&sources).compile(source, None).unwrap();
        let body = format!("{:?}", program.macros[0].body);
        assert!(body.contains("snapshot"));
        assert!(!body.contains(">lib<"));
    }
}
