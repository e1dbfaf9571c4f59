//! Expression evaluation against a [`Scope`].

use crate::ast::{Expression, Literal, Path, StringPart};
use crate::error::EvalError;
use crate::scope::Scope;
use crate::value::Value;

/// Evaluates `host:` fragments on behalf of the expression engine.
pub trait HostEvaluator {
    fn evaluate_host(&self, code: &str, scope: &Scope) -> Result<Value, EvalError>;
}

/// Rejects every host expression.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl HostEvaluator for NoHost {
    fn evaluate_host(&self, code: &str, _scope: &Scope) -> Result<Value, EvalError> {
        Err(EvalError::host(format!(
            "no host evaluator available for '{}'",
            code
        )))
    }
}

/// Everything an expression can see while it is evaluated.
pub struct EvaluationContext<'a> {
    pub scope: &'a Scope,
    pub host: &'a dyn HostEvaluator,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(scope: &'a Scope, host: &'a dyn HostEvaluator) -> Self {
        EvaluationContext { scope, host }
    }
}

pub fn evaluate(expr: &Expression, e_ctx: &EvaluationContext) -> Result<Value, EvalError> {
    match expr {
        Expression::Path(path) => resolve_path(path, e_ctx.scope).cloned(),
        Expression::Alternatives(alternatives) => {
            let mut last_error = None;
            for alternative in alternatives {
                match evaluate(alternative, e_ctx) {
                    Ok(value) => return Ok(value),
                    Err(e) if e.is_lookup_failure() => last_error = Some(e),
                    Err(e) => return Err(e),
                }
            }
            Err(last_error.unwrap_or_else(|| EvalError::type_error("empty alternatives")))
        }
        Expression::String(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    StringPart::Text(text) => out.push_str(text),
                    StringPart::Interpolation(inner) => {
                        out.push_str(&evaluate(inner, e_ctx)?.to_text());
                    }
                }
            }
            Ok(Value::Str(out))
        }
        Expression::Not(inner) => Ok(Value::Bool(!evaluate(inner, e_ctx)?.is_truthy())),
        Expression::Exists(paths) => Ok(Value::Bool(
            paths.iter().any(|p| resolve_path(p, e_ctx.scope).is_ok()),
        )),
        Expression::Literal(Literal::Int(i)) => Ok(Value::Int(*i)),
        Expression::Literal(Literal::Float(f)) => Ok(Value::Float(*f)),
        Expression::Nothing => Ok(Value::Nothing),
        Expression::Default => Ok(Value::Default),
        Expression::Host(code) => {
            log::trace!("Delegating host expression '{}'", code);
            e_ctx.host.evaluate_host(code, e_ctx.scope)
        }
    }
}

/// Walks `path` from its root variable through map keys and list indices.
pub fn resolve_path<'s>(path: &Path, scope: &'s Scope) -> Result<&'s Value, EvalError> {
    let mut current = scope
        .get(&path.root)
        .ok_or_else(|| EvalError::UndefinedVariable(path.root.clone()))?;
    for segment in &path.segments {
        current = current.get(segment).ok_or_else(|| EvalError::PathNavigation {
            path: path.to_string(),
            segment: segment.clone(),
            message: match current {
                Value::Map(_) => "no such key".to_string(),
                Value::List(_) => "index out of range".to_string(),
                other => format!("cannot traverse a {} value", other.type_name()),
            },
        })?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use serde_json::json;

    fn scope() -> Scope {
        Scope::new([
            ("user", Value::from(json!({"name": "Ada", "tags": ["a", "b"]}))),
            ("count", Value::Int(3)),
        ])
    }

    fn eval(text: &str, scope: &Scope) -> Result<Value, EvalError> {
        let expr = parse_expression(text).unwrap();
        evaluate(&expr, &EvaluationContext::new(scope, &NoHost))
    }

    #[test]
    fn test_eval_paths() {
        let scope = scope();
        assert_eq!(eval("user/name", &scope).unwrap(), Value::from("Ada"));
        assert_eq!(eval("user.tags.1", &scope).unwrap(), Value::from("b"));
    }

    #[test]
    fn test_eval_undefined_path_errors() {
        let scope = scope();
        assert_eq!(
            eval("missing/x", &scope),
            Err(EvalError::UndefinedVariable("missing".into()))
        );
        assert!(matches!(
            eval("user/age", &scope),
            Err(EvalError::PathNavigation { .. })
        ));
        assert!(matches!(
            eval("count/x", &scope),
            Err(EvalError::PathNavigation { .. })
        ));
    }

    #[test]
    fn test_eval_alternatives_fall_through() {
        let scope = scope();
        assert_eq!(eval("user/age | count", &scope).unwrap(), Value::Int(3));
        assert_eq!(eval("missing | nothing", &scope).unwrap(), Value::Nothing);
        assert!(eval("missing | other", &scope).is_err());
    }

    #[test]
    fn test_eval_string_and_predicates() {
        let scope = scope();
        assert_eq!(
            eval("string:${user/name} has $count tags", &scope).unwrap(),
            Value::from("Ada has 3 tags")
        );
        assert_eq!(eval("exists: user/name", &scope).unwrap(), Value::Bool(true));
        assert_eq!(eval("exists: user/age", &scope).unwrap(), Value::Bool(false));
        assert_eq!(eval("not: user/name", &scope).unwrap(), Value::Bool(false));
        assert_eq!(eval("not: nothing", &scope).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_eval_host_without_evaluator_errors() {
        let scope = scope();
        assert!(matches!(eval("host: 1 + 1", &scope), Err(EvalError::Host(_))));
    }

    struct Echo;

    impl HostEvaluator for Echo {
        fn evaluate_host(&self, code: &str, _scope: &Scope) -> Result<Value, EvalError> {
            Ok(Value::from(code))
        }
    }

    #[test]
    fn test_eval_host_delegates() {
        let scope = scope();
        let expr = parse_expression("string:[${host: x}]").unwrap();
        let value = evaluate(&expr, &EvaluationContext::new(&scope, &Echo)).unwrap();
        assert_eq!(value, Value::from("[x]"));
    }
}
