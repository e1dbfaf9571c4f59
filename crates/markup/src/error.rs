use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A position in a template source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Moves a 1-based line and column past `text`.
///
/// Columns count characters, so multi-byte text advances by one per char.
pub(crate) fn advance(line: usize, column: usize, text: &str) -> (usize, usize) {
    match text.rfind('\n') {
        Some(last) => (
            line + text.matches('\n').count(),
            text[last + 1..].chars().count() + 1,
        ),
        None => (line, column + text.chars().count()),
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filename {
            Some(name) => write!(f, "{}, line {}, column {}", name, self.line, self.column),
            None => write!(f, "line {}, column {}", self.line, self.column),
        }
    }
}

/// Malformed markup: unbalanced tags, undefined prefixes, unrecognised tags.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at {location}: {text:?}")]
pub struct ParseError {
    pub message: String,
    pub location: Location,
    /// The offending source text.
    pub text: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: Location, text: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location,
            text: text.into(),
        }
    }
}
