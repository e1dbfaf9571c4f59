use std::fmt;
use talc_markup::{Location, ParseError};
use talc_tales::EvalError;
use talc_traits::ResourceError;
use thiserror::Error;

/// Errors that can occur while compiling or rendering a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Macro resolution error at {location}: {message}")]
    MacroResolution { message: String, location: Location },

    #[error("Compile error{}: {message}", location_suffix(.location))]
    Compile {
        message: String,
        location: Option<Location>,
    },

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn location_suffix(location: &Option<Location>) -> String {
    location
        .as_ref()
        .map(|l| format!(" at {}", l))
        .unwrap_or_default()
}

impl TemplateError {
    pub fn macro_resolution(message: impl Into<String>, location: &Location) -> Self {
        Self::MacroResolution {
            message: message.into(),
            location: location.clone(),
        }
    }

    pub fn compile(message: impl Into<String>, location: Option<&Location>) -> Self {
        Self::Compile {
            message: message.into(),
            location: location.cloned(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderErrorKind {
    Expression,
    Type,
    MacroResolution,
    /// The output sink rejected a write; never recoverable by `on-error`.
    Output,
}

impl fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderErrorKind::Expression => "ExpressionError",
            RenderErrorKind::Type => "TypeError",
            RenderErrorKind::MacroResolution => "MacroResolutionError",
            RenderErrorKind::Output => "OutputError",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}{}: {message}", location_suffix(.location))]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub message: String,
    pub location: Option<Location>,
    /// Classification of the underlying evaluation failure, if any.
    pub cause: Option<&'static str>,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind, message: impl Into<String>, location: Option<&Location>) -> Self {
        RenderError {
            kind,
            message: message.into(),
            location: location.cloned(),
            cause: None,
        }
    }

    pub fn evaluation(err: EvalError, expression: &str, location: &Location) -> Self {
        let kind = match err {
            EvalError::Type(_) => RenderErrorKind::Type,
            _ => RenderErrorKind::Expression,
        };
        RenderError {
            kind,
            message: format!("{} (in '{}')", err, expression),
            location: Some(location.clone()),
            cause: Some(err.type_name()),
        }
    }

    pub fn output(err: fmt::Error) -> Self {
        RenderError::new(RenderErrorKind::Output, err.to_string(), None)
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind != RenderErrorKind::Output
    }

    /// The name exposed to templates as `error/type`.
    pub fn type_name(&self) -> String {
        self.cause
            .map(str::to_string)
            .unwrap_or_else(|| self.kind.to_string())
    }
}
