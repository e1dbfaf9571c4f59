use thiserror::Error;

/// An expression that cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Expression syntax error in '{expression}': {message}")]
pub struct TalesError {
    pub expression: String,
    pub message: String,
}

impl TalesError {
    pub fn syntax(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

/// Failure while evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Cannot traverse '{segment}' in path '{path}': {message}")]
    PathNavigation {
        path: String,
        segment: String,
        message: String,
    },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Host expression error: {0}")]
    Host(String),
}

impl EvalError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// True for failures that let a path alternative fall through to the next one.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            EvalError::UndefinedVariable(_) | EvalError::PathNavigation { .. }
        )
    }

    /// Short classification exposed to templates as `error/type`.
    pub fn type_name(&self) -> &'static str {
        match self {
            EvalError::UndefinedVariable(_) => "NameError",
            EvalError::PathNavigation { .. } => "LookupError",
            EvalError::Type(_) => "TypeError",
            EvalError::Host(_) => "HostError",
        }
    }
}
