//! Defines the Abstract Syntax Tree (AST) for TALES expressions.
use serde::{Deserialize, Serialize};
use std::fmt;

/// The top-level representation of a parsed expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A variable path such as `item/title` or `item.title`.
    Path(Path),
    /// `a | b | nothing`: the first alternative that resolves wins.
    Alternatives(Vec<Expression>),
    /// `string:` with `${...}` and `$name` interpolation.
    String(Vec<StringPart>),
    /// `not:` negation of the truthiness of the inner expression.
    Not(Box<Expression>),
    /// `exists:` true when any of the paths resolves.
    Exists(Vec<Path>),
    /// A numeric literal.
    Literal(Literal),
    /// `nothing` / `null`.
    Nothing,
    /// `default`.
    Default,
    /// `host:` code, evaluated by the rendering backend.
    Host(String),
}

impl Expression {
    /// Calls `visit` for every host-code fragment inside this expression.
    pub fn visit_host_code(&self, visit: &mut dyn FnMut(&str)) {
        match self {
            Expression::Host(code) => visit(code),
            Expression::Alternatives(alts) => {
                for alt in alts {
                    alt.visit_host_code(visit);
                }
            }
            Expression::String(parts) => {
                for part in parts {
                    if let StringPart::Interpolation(inner) = part {
                        inner.visit_host_code(visit);
                    }
                }
            }
            Expression::Not(inner) => inner.visit_host_code(visit),
            Expression::Path(_)
            | Expression::Exists(_)
            | Expression::Literal(_)
            | Expression::Nothing
            | Expression::Default => {}
        }
    }

    /// The path this expression consists of, if it is a plain path.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Expression::Path(path) => Some(path),
            _ => None,
        }
    }
}

/// A variable followed by member or index segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    pub root: String,
    pub segments: Vec<String>,
}

impl Path {
    pub fn new(root: impl Into<String>, segments: Vec<String>) -> Self {
        Path {
            root: root.into(),
            segments,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StringPart {
    Text(String),
    Interpolation(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
}
