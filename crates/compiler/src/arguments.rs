//! Parsers for directive argument lists.
//!
//! Multi-entry directives (`define`, `attributes`, `define-param`,
//! `fill-param`, `import`) separate entries with `;`, with `;;` standing
//! for a literal semicolon.

use talc_markup::Location;
use talc_tales::{parse_expression, split_arguments};
use talc_template_core::{
    DefineKind, Expr, Omit, ParamFill, ParamSpec, ParamValue, TemplateError, TypeTag,
};

/// Parses `text` as a TALES expression attached to `location`.
pub fn compile_expr(text: &str, location: &Location) -> Result<Expr, TemplateError> {
    let expression = parse_expression(text)
        .map_err(|e| TemplateError::compile(e.to_string(), Some(location)))?;
    Ok(Expr {
        text: text.trim().to_string(),
        expression,
        location: location.clone(),
    })
}

/// Splits off the first whitespace-delimited word.
fn first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim_start()),
        None => (text, ""),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn require_identifier(name: &str, what: &str, location: &Location) -> Result<(), TemplateError> {
    if is_identifier(name) {
        Ok(())
    } else if name.is_empty() {
        Err(TemplateError::compile(format!("missing {}", what), Some(location)))
    } else {
        Err(TemplateError::compile(
            format!("invalid {} '{}'", what, name),
            Some(location),
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub kind: DefineKind,
    pub name: String,
    pub expr: Expr,
}

/// `tal:define="[local|global|set] NAME EXPR; ..."`
pub fn parse_define(argument: &str, location: &Location) -> Result<Vec<Definition>, TemplateError> {
    split_arguments(argument)
        .iter()
        .map(|entry| {
            let (word, rest) = first_word(entry);
            let (kind, name, rest) = match word {
                "local" | "global" | "set" => {
                    let kind = match word {
                        "global" => DefineKind::Global,
                        "set" => DefineKind::Set,
                        _ => DefineKind::Local,
                    };
                    let (name, rest) = first_word(rest);
                    (kind, name, rest)
                }
                _ => (DefineKind::Local, word, rest),
            };
            require_identifier(name, "variable name in tal:define", location)?;
            if rest.is_empty() {
                return Err(TemplateError::compile(
                    format!("missing expression for '{}' in tal:define", name),
                    Some(location),
                ));
            }
            Ok(Definition {
                kind,
                name: name.to_string(),
                expr: compile_expr(rest, location)?,
            })
        })
        .collect()
}

/// `tal:repeat="NAME EXPR"`
pub fn parse_repeat(argument: &str, location: &Location) -> Result<(String, Expr), TemplateError> {
    let (name, rest) = first_word(argument);
    require_identifier(name, "loop variable in tal:repeat", location)?;
    if rest.trim().is_empty() {
        return Err(TemplateError::compile(
            "missing expression in tal:repeat",
            Some(location),
        ));
    }
    Ok((name.to_string(), compile_expr(rest, location)?))
}

/// `[text|structure] EXPR`, shared by `content`, `replace` and `on-error`.
/// Returns whether the value is inserted as structure.
pub fn parse_content(argument: &str, location: &Location) -> Result<(bool, Expr), TemplateError> {
    let (word, rest) = first_word(argument);
    let (structure, text) = match word {
        "structure" if !rest.is_empty() => (true, rest),
        "text" if !rest.is_empty() => (false, rest),
        _ => (false, argument),
    };
    Ok((structure, compile_expr(text, location)?))
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEntry {
    pub name: String,
    pub expr: Expr,
}

/// `tal:attributes="NAME EXPR; ..."`
pub fn parse_attributes(
    argument: &str,
    location: &Location,
) -> Result<Vec<AttributeEntry>, TemplateError> {
    split_arguments(argument)
        .iter()
        .map(|entry| {
            let (name, rest) = first_word(entry);
            let valid_name = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'));
            if !valid_name {
                return Err(TemplateError::compile(
                    format!("invalid attribute name '{}' in tal:attributes", name),
                    Some(location),
                ));
            }
            if rest.is_empty() {
                return Err(TemplateError::compile(
                    format!("missing expression for attribute '{}'", name),
                    Some(location),
                ));
            }
            Ok(AttributeEntry {
                name: name.to_string(),
                expr: compile_expr(rest, location)?,
            })
        })
        .collect()
}

/// `tal:omit-tag="[EXPR]"`; an empty argument always omits.
pub fn parse_omit(argument: &str, location: &Location) -> Result<Omit, TemplateError> {
    if argument.trim().is_empty() {
        Ok(Omit::Always)
    } else {
        Ok(Omit::When(compile_expr(argument, location)?))
    }
}

/// `metal:define-param="TYPE NAME [DEFAULT]; ..."`
pub fn parse_define_param(
    argument: &str,
    location: &Location,
) -> Result<Vec<ParamSpec>, TemplateError> {
    split_arguments(argument)
        .iter()
        .map(|entry| {
            let (type_name, rest) = first_word(entry);
            let type_tag = TypeTag::parse(type_name).ok_or_else(|| {
                TemplateError::compile(
                    format!("unknown parameter type '{}'", type_name),
                    Some(location),
                )
            })?;
            let (name, default) = first_word(rest);
            require_identifier(name, "parameter name in metal:define-param", location)?;
            let default = if default.is_empty() {
                None
            } else {
                Some(compile_expr(default, location)?)
            };
            Ok(ParamSpec {
                name: name.to_string(),
                type_tag,
                default,
            })
        })
        .collect()
}

/// `metal:fill-param="NAME EXPR|default; ..."`
pub fn parse_fill_param(
    argument: &str,
    location: &Location,
) -> Result<Vec<ParamFill>, TemplateError> {
    split_arguments(argument)
        .iter()
        .map(|entry| {
            let (name, rest) = first_word(entry);
            require_identifier(name, "parameter name in metal:fill-param", location)?;
            let value = match rest.trim() {
                "" => {
                    return Err(TemplateError::compile(
                        format!("missing value for parameter '{}'", name),
                        Some(location),
                    ));
                }
                "default" => ParamValue::Default,
                text => ParamValue::Expr(compile_expr(text, location)?),
            };
            Ok(ParamFill {
                name: name.to_string(),
                value,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// Empty for the template's own namespace.
    pub alias: String,
    pub path: String,
}

/// `metal:import="[alias:]path; ..."`
///
/// A leading `word:` is an alias unless it starts a URI (`scheme://`).
pub fn parse_imports(argument: &str) -> Vec<ImportEntry> {
    split_arguments(argument)
        .into_iter()
        .map(|entry| match entry.split_once(':') {
            Some((alias, path)) if is_identifier(alias) && !path.starts_with("//") => {
                ImportEntry {
                    alias: alias.to_string(),
                    path: path.trim().to_string(),
                }
            }
            _ => ImportEntry {
                alias: String::new(),
                path: entry,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use talc_tales::Expression;

    fn loc() -> Location {
        Location::default()
    }

    #[test]
    fn test_parse_define_keywords() {
        let defs = parse_define("a 1; global b string:x;; y; set a 2", &loc()).unwrap();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].kind, DefineKind::Local);
        assert_eq!(defs[0].name, "a");
        assert_eq!(defs[1].kind, DefineKind::Global);
        assert_eq!(defs[1].expr.text, "string:x; y");
        assert_eq!(defs[2].kind, DefineKind::Set);
    }

    #[test]
    fn test_parse_define_requires_expression() {
        assert!(parse_define("a", &loc()).is_err());
        assert!(parse_define("9x 1", &loc()).is_err());
    }

    #[test]
    fn test_parse_repeat() {
        let (name, expr) = parse_repeat("item items/all", &loc()).unwrap();
        assert_eq!(name, "item");
        assert_eq!(expr.text, "items/all");
        assert!(parse_repeat("item", &loc()).is_err());
    }

    #[test]
    fn test_parse_content_keywords() {
        let (structure, expr) = parse_content("structure body", &loc()).unwrap();
        assert!(structure);
        assert_eq!(expr.text, "body");
        let (structure, expr) = parse_content("text body", &loc()).unwrap();
        assert!(!structure);
        assert_eq!(expr.text, "body");
        let (structure, expr) = parse_content("structure", &loc()).unwrap();
        assert!(!structure);
        assert_eq!(expr.text, "structure");
    }

    #[test]
    fn test_parse_attributes() {
        let entries = parse_attributes("href default;class null;new string:test", &loc()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["href", "class", "new"]);
        assert_eq!(entries[0].expr.expression, Expression::Default);
        assert_eq!(entries[1].expr.expression, Expression::Nothing);
    }

    #[test]
    fn test_parse_define_param() {
        let params = parse_define_param("int count 5; string label", &loc()).unwrap();
        assert_eq!(params[0].type_tag, TypeTag::Int);
        assert!(params[0].default.is_some());
        assert!(params[1].is_nullable());
        let err = parse_define_param("widget x", &loc()).unwrap_err();
        assert!(err.to_string().contains("unknown parameter type 'widget'"));
    }

    #[test]
    fn test_parse_fill_param() {
        let fills = parse_fill_param("count default; label string:hi", &loc()).unwrap();
        assert_eq!(fills[0].value, ParamValue::Default);
        assert!(matches!(&fills[1].value, ParamValue::Expr(e) if e.text == "string:hi"));
        assert!(parse_fill_param("count", &loc()).is_err());
    }

    #[test]
    fn test_parse_imports() {
        let imports = parse_imports("lib.pt; ui:widgets/ui.pt; http://x/y.pt");
        assert_eq!(
            imports,
            vec![
                ImportEntry {
                    alias: String::new(),
                    path: "lib.pt".into()
                },
                ImportEntry {
                    alias: "ui".into(),
                    path: "widgets/ui.pt".into()
                },
                ImportEntry {
                    alias: String::new(),
                    path: "http://x/y.pt".into()
                },
            ]
        );
    }

    #[test]
    fn test_compile_expr_reports_location() {
        let location = Location {
            line: 3,
            column: 7,
            ..Location::default()
        };
        let err = compile_expr("bogus:thing", &location).unwrap_err();
        assert!(matches!(err, TemplateError::Compile { location: Some(l), .. } if l.line == 3));
    }
}
