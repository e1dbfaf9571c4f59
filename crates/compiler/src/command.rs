//! Directive extraction.
//!
//! Every element's directive attributes are collected into a [`CommandSet`].
//! TAL commands run in a fixed order regardless of attribute order:
//! define, condition, repeat, content/replace, attributes, omit-tag, with
//! on-error wrapping the whole element. METAL commands are kept apart and
//! rewrite the element structurally before any TAL command applies.

use quick_xml::escape::unescape;
use talc_markup::{Attribute, Element, Location, METAL_NS, TAL_NS, XMLNS_NS};
use talc_template_core::TemplateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TalKind {
    Define,
    Condition,
    Repeat,
    Content,
    Replace,
    Attributes,
    OmitTag,
    OnError,
}

impl TalKind {
    pub fn from_local(name: &str) -> Option<TalKind> {
        Some(match name {
            "define" => TalKind::Define,
            "condition" => TalKind::Condition,
            "repeat" => TalKind::Repeat,
            "content" => TalKind::Content,
            "replace" => TalKind::Replace,
            "attributes" => TalKind::Attributes,
            "omit-tag" => TalKind::OmitTag,
            "on-error" => TalKind::OnError,
            _ => return None,
        })
    }

    /// Execution priority; lower runs first. `on-error` wraps everything.
    pub fn priority(&self) -> u8 {
        match self {
            TalKind::Define => 0,
            TalKind::Condition => 1,
            TalKind::Repeat => 2,
            TalKind::Content | TalKind::Replace => 3,
            TalKind::Attributes => 4,
            TalKind::OmitTag => 5,
            TalKind::OnError => 6,
        }
    }

    pub fn attribute_name(&self) -> &'static str {
        match self {
            TalKind::Define => "tal:define",
            TalKind::Condition => "tal:condition",
            TalKind::Repeat => "tal:repeat",
            TalKind::Content => "tal:content",
            TalKind::Replace => "tal:replace",
            TalKind::Attributes => "tal:attributes",
            TalKind::OmitTag => "tal:omit-tag",
            TalKind::OnError => "tal:on-error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetalKind {
    DefineMacro,
    UseMacro,
    DefineSlot,
    FillSlot,
    DefineParam,
    FillParam,
    Import,
}

impl MetalKind {
    pub fn from_local(name: &str) -> Option<MetalKind> {
        Some(match name {
            "define-macro" => MetalKind::DefineMacro,
            "use-macro" => MetalKind::UseMacro,
            "define-slot" => MetalKind::DefineSlot,
            "fill-slot" => MetalKind::FillSlot,
            "define-param" => MetalKind::DefineParam,
            "fill-param" => MetalKind::FillParam,
            "import" => MetalKind::Import,
            _ => return None,
        })
    }

    pub fn attribute_name(&self) -> &'static str {
        match self {
            MetalKind::DefineMacro => "metal:define-macro",
            MetalKind::UseMacro => "metal:use-macro",
            MetalKind::DefineSlot => "metal:define-slot",
            MetalKind::FillSlot => "metal:fill-slot",
            MetalKind::DefineParam => "metal:define-param",
            MetalKind::FillParam => "metal:fill-param",
            MetalKind::Import => "metal:import",
        }
    }
}

/// One directive with its entity-unescaped argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Command<K> {
    pub kind: K,
    pub argument: String,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveNamespace {
    Tal,
    Metal,
}

/// Which directive namespace an attribute belongs to, if any.
///
/// On `tal:*` and `metal:*` elements unprefixed attributes are directives
/// of the element's namespace.
fn directive_namespace(element: &Element, attribute: &Attribute) -> Option<DirectiveNamespace> {
    if attribute.name.is_in(TAL_NS) {
        return Some(DirectiveNamespace::Tal);
    }
    if attribute.name.is_in(METAL_NS) {
        return Some(DirectiveNamespace::Metal);
    }
    if attribute.raw_name.contains(':') {
        return None;
    }
    if element.name().is_in(TAL_NS) {
        Some(DirectiveNamespace::Tal)
    } else if element.name().is_in(METAL_NS) {
        Some(DirectiveNamespace::Metal)
    } else {
        None
    }
}

/// True for attributes that never reach the output: directives and
/// `xmlns` declarations of the directive namespaces.
pub fn is_stripped_attribute(element: &Element, attribute: &Attribute) -> bool {
    if directive_namespace(element, attribute).is_some() {
        return true;
    }
    attribute.name.is_in(XMLNS_NS)
        && matches!(attribute.value.as_deref(), Some(TAL_NS) | Some(METAL_NS))
}

/// True for elements whose own tags are never rendered.
pub fn is_directive_element(element: &Element) -> bool {
    element.name().is_in(TAL_NS) || element.name().is_in(METAL_NS)
}

/// The directives of one element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSet {
    tal: Vec<Command<TalKind>>,
    metal: Vec<Command<MetalKind>>,
}

impl CommandSet {
    pub fn extract(element: &Element) -> Result<CommandSet, TemplateError> {
        let mut set = CommandSet::default();
        for attribute in &element.start.attributes {
            let Some(namespace) = directive_namespace(element, attribute) else {
                continue;
            };
            let argument = unescape_argument(attribute)?;
            let local = attribute.name.local.as_str();
            let location = attribute.location.clone();
            match namespace {
                DirectiveNamespace::Tal => {
                    let kind = TalKind::from_local(local).ok_or_else(|| {
                        TemplateError::compile(
                            format!("unknown TAL attribute '{}'", attribute.raw_name),
                            Some(&location),
                        )
                    })?;
                    if set.tal(kind).is_some() {
                        return Err(duplicate(kind.attribute_name(), &location));
                    }
                    set.tal.push(Command { kind, argument, location });
                }
                DirectiveNamespace::Metal => {
                    let kind = MetalKind::from_local(local).ok_or_else(|| {
                        TemplateError::compile(
                            format!("unknown METAL attribute '{}'", attribute.raw_name),
                            Some(&location),
                        )
                    })?;
                    if set.metal(kind).is_some() {
                        return Err(duplicate(kind.attribute_name(), &location));
                    }
                    set.metal.push(Command { kind, argument, location });
                }
            }
        }

        if set.tal(TalKind::Content).is_some() && set.tal(TalKind::Replace).is_some() {
            return Err(TemplateError::compile(
                "tal:content and tal:replace cannot be used on the same element",
                Some(element.location()),
            ));
        }
        set.tal.sort_by_key(|c| c.kind.priority());
        Ok(set)
    }

    pub fn tal(&self, kind: TalKind) -> Option<&Command<TalKind>> {
        self.tal.iter().find(|c| c.kind == kind)
    }

    pub fn metal(&self, kind: MetalKind) -> Option<&Command<MetalKind>> {
        self.metal.iter().find(|c| c.kind == kind)
    }

    /// TAL commands in execution order.
    pub fn tal_commands(&self) -> &[Command<TalKind>] {
        &self.tal
    }

    pub fn is_empty(&self) -> bool {
        self.tal.is_empty() && self.metal.is_empty()
    }
}

fn duplicate(name: &str, location: &Location) -> TemplateError {
    TemplateError::compile(format!("duplicate {} attribute", name), Some(location))
}

fn unescape_argument(attribute: &Attribute) -> Result<String, TemplateError> {
    let raw = attribute.value.as_deref().unwrap_or("");
    unescape(raw).map(|s| s.into_owned()).map_err(|e| {
        TemplateError::compile(
            format!("invalid entity in {}: {}", attribute.raw_name, e),
            Some(&attribute.location),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use talc_markup::{Node, parse};

    fn first_element(source: &str) -> Element {
        let doc = parse(source, None).unwrap();
        doc.nodes
            .into_iter()
            .find_map(|n| match n {
                Node::Element(el) => Some(el),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_tal_commands_follow_fixed_priority() {
        let el = first_element(
            r#"<p tal:omit-tag="" tal:content="x" tal:on-error="nothing" tal:repeat="i items" tal:condition="c" tal:define="a 1" tal:attributes="b 2">x</p>"#,
        );
        let set = CommandSet::extract(&el).unwrap();
        let kinds: Vec<TalKind> = set.tal_commands().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TalKind::Define,
                TalKind::Condition,
                TalKind::Repeat,
                TalKind::Content,
                TalKind::Attributes,
                TalKind::OmitTag,
                TalKind::OnError,
            ]
        );
    }

    #[test]
    fn test_content_and_replace_conflict() {
        let el = first_element(r#"<p tal:content="a" tal:replace="b"/>"#);
        assert!(matches!(
            CommandSet::extract(&el),
            Err(TemplateError::Compile { .. })
        ));
    }

    #[test]
    fn test_unknown_directive_is_error() {
        let el = first_element(r#"<p tal:contents="a"/>"#);
        let err = CommandSet::extract(&el).unwrap_err();
        assert!(err.to_string().contains("unknown TAL attribute 'tal:contents'"));
    }

    #[test]
    fn test_unprefixed_attributes_on_directive_elements() {
        let el = first_element(r#"<tal:block define="x 1" condition="x">y</tal:block>"#);
        let set = CommandSet::extract(&el).unwrap();
        assert_eq!(set.tal(TalKind::Define).unwrap().argument, "x 1");
        assert!(set.tal(TalKind::Condition).is_some());
        assert!(is_directive_element(&el));
    }

    #[test]
    fn test_arguments_are_unescaped() {
        let el = first_element(r#"<p tal:content="string:a &amp; b"/>"#);
        let set = CommandSet::extract(&el).unwrap();
        assert_eq!(set.tal(TalKind::Content).unwrap().argument, "string:a & b");
    }

    #[test]
    fn test_stripped_attributes() {
        let el = first_element(
            r#"<html xmlns:tal="http://xml.zope.org/namespaces/tal" xmlns:x="urn:x" lang="en" tal:define="a 1"/>"#,
        );
        let stripped: Vec<&str> = el
            .start
            .attributes
            .iter()
            .filter(|a| is_stripped_attribute(&el, a))
            .map(|a| a.raw_name.as_str())
            .collect();
        assert_eq!(stripped, vec!["xmlns:tal", "tal:define"]);
    }

    #[test]
    fn test_metal_commands() {
        let el = first_element(r#"<div metal:use-macro="macros/page" metal:fill-slot="body"/>"#);
        let set = CommandSet::extract(&el).unwrap();
        assert_eq!(set.metal(MetalKind::UseMacro).unwrap().argument, "macros/page");
        assert_eq!(set.metal(MetalKind::FillSlot).unwrap().argument, "body");
        assert!(set.tal_commands().is_empty());
    }
}
