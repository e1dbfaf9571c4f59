//! Evaluation of parsed `host:` expressions against a TALES scope.
use super::HostError;
use super::ast::{BinaryOp, HostExpr, UnaryOp};
use super::functions::{FunctionRegistry, as_number};
use super::parser::parse_host;
use std::cmp::Ordering;
use std::collections::HashMap;
use talc_tales::{EvalError, HostEvaluator, Scope, Value};

/// Pre-parsed host expressions plus the functions they may call.
#[derive(Debug, Clone, Default)]
pub struct HostRuntime {
    expressions: HashMap<String, HostExpr>,
    functions: FunctionRegistry,
}

impl HostRuntime {
    pub fn new(functions: FunctionRegistry) -> Self {
        Self {
            expressions: HashMap::new(),
            functions,
        }
    }

    /// Parses `code` and checks that every function it calls is available.
    pub fn prepare(&mut self, code: &str) -> Result<(), HostError> {
        if self.expressions.contains_key(code) {
            return Ok(());
        }
        let expr = parse_host(code)?;
        check_functions(&expr, &self.functions)?;
        self.expressions.insert(code.to_string(), expr);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    fn eval(&self, expr: &HostExpr, scope: &Scope) -> Result<Value, EvalError> {
        match expr {
            HostExpr::Literal(value) => Ok(value.clone()),
            HostExpr::Name(name) => scope
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            HostExpr::List(items) => items
                .iter()
                .map(|item| self.eval(item, scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            HostExpr::Unary(UnaryOp::Not, inner) => {
                Ok(Value::Bool(!self.eval(inner, scope)?.is_truthy()))
            }
            HostExpr::Unary(UnaryOp::Neg, inner) => match self.eval(inner, scope)? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::type_error("integer overflow in unary -")),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(EvalError::type_error(format!(
                    "bad operand type for unary -: {}",
                    other.type_name()
                ))),
            },
            HostExpr::Binary(BinaryOp::And, lhs, rhs) => {
                let left = self.eval(lhs, scope)?;
                if left.is_truthy() {
                    self.eval(rhs, scope)
                } else {
                    Ok(left)
                }
            }
            HostExpr::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = self.eval(lhs, scope)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(rhs, scope)
                }
            }
            HostExpr::Binary(op, lhs, rhs) => {
                let left = self.eval(lhs, scope)?;
                let right = self.eval(rhs, scope)?;
                binary(*op, left, right)
            }
            HostExpr::Member(target, name) => {
                let value = self.eval(target, scope)?;
                value
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::PathNavigation {
                        path: format!("{}.{}", describe(target), name),
                        segment: name.clone(),
                        message: format!("{} value has no member '{}'", value.type_name(), name),
                    })
            }
            HostExpr::Index(target, index) => {
                let value = self.eval(target, scope)?;
                let index = self.eval(index, scope)?;
                subscript(&value, &index)
            }
            HostExpr::Call { function, args } => {
                let func = self
                    .functions
                    .get(function)
                    .ok_or_else(|| EvalError::host(format!("unknown function '{}'", function)))?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                func(&args)
            }
        }
    }
}

impl HostEvaluator for HostRuntime {
    fn evaluate_host(&self, code: &str, scope: &Scope) -> Result<Value, EvalError> {
        match self.expressions.get(code) {
            Some(expr) => self.eval(expr, scope),
            None => {
                log::debug!("Host expression '{}' was not prepared; parsing now", code);
                let expr = parse_host(code).map_err(|e| EvalError::host(e.to_string()))?;
                self.eval(&expr, scope)
            }
        }
    }
}

fn check_functions(expr: &HostExpr, functions: &FunctionRegistry) -> Result<(), HostError> {
    match expr {
        HostExpr::Literal(_) | HostExpr::Name(_) => Ok(()),
        HostExpr::List(items) => items.iter().try_for_each(|i| check_functions(i, functions)),
        HostExpr::Unary(_, inner) | HostExpr::Member(inner, _) => check_functions(inner, functions),
        HostExpr::Binary(_, lhs, rhs) | HostExpr::Index(lhs, rhs) => {
            check_functions(lhs, functions)?;
            check_functions(rhs, functions)
        }
        HostExpr::Call { function, args } => {
            if !functions.contains(function) {
                return Err(HostError::UnknownFunction(function.clone()));
            }
            args.iter().try_for_each(|a| check_functions(a, functions))
        }
    }
}

fn describe(expr: &HostExpr) -> String {
    match expr {
        HostExpr::Name(name) => name.clone(),
        HostExpr::Member(target, name) => format!("{}.{}", describe(target), name),
        _ => "<expression>".to_string(),
    }
}

fn subscript(value: &Value, index: &Value) -> Result<Value, EvalError> {
    let out_of_range = || EvalError::PathNavigation {
        path: format!("[{}]", index.to_text()),
        segment: index.to_text(),
        message: "index out of range".to_string(),
    };
    match (value, index) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let position = if *i < 0 { len + i } else { *i };
            usize::try_from(position)
                .ok()
                .and_then(|p| items.get(p))
                .cloned()
                .ok_or_else(out_of_range)
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let position = if *i < 0 { len + i } else { *i };
            usize::try_from(position)
                .ok()
                .and_then(|p| chars.get(p))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(out_of_range)
        }
        (Value::Map(map), Value::Str(key)) => map.get(key).cloned().ok_or_else(|| {
            EvalError::PathNavigation {
                path: format!("['{}']", key),
                segment: key.clone(),
                message: "no such key".to_string(),
            }
        }),
        (target, index) => Err(EvalError::type_error(format!(
            "{} value cannot be indexed by {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => {
            arithmetic(op, &left, &right)
        }
        BinaryOp::Eq => Ok(Value::Bool(equals(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(&left, &right))),
        BinaryOp::Lt => Ok(Value::Bool(compare(&left, &right)? == Some(Ordering::Less))),
        BinaryOp::Le => Ok(Value::Bool(matches!(
            compare(&left, &right)?,
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinaryOp::Gt => Ok(Value::Bool(
            compare(&left, &right)? == Some(Ordering::Greater),
        )),
        BinaryOp::Ge => Ok(Value::Bool(matches!(
            compare(&left, &right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        BinaryOp::In => contains(&right, &left).map(Value::Bool),
        BinaryOp::NotIn => contains(&right, &left).map(|found| Value::Bool(!found)),
        BinaryOp::And | BinaryOp::Or => Err(EvalError::type_error(
            "boolean operators are evaluated lazily",
        )),
    }
}

fn add(left: Value, right: Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (left, right) => arithmetic(BinaryOp::Add, &left, &right),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let unsupported = || {
        EvalError::type_error(format!(
            "unsupported operand types for {:?}: {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))
    };
    let zero_division = || EvalError::type_error("division by zero");
    let overflow = || EvalError::type_error(format!("integer overflow in {:?}", op));

    if let (Some(a), Some(b)) = (integer(left), integer(right)) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if b == 0 => return Err(zero_division()),
            BinaryOp::Div => return Ok(Value::Float(a as f64 / b as f64)),
            BinaryOp::FloorDiv | BinaryOp::Mod if b == 0 => return Err(zero_division()),
            BinaryOp::FloorDiv => floor_div(a, b),
            BinaryOp::Mod => Some(floor_mod(a, b)),
            _ => return Err(unsupported()),
        };
        return result.map(Value::Int).ok_or_else(overflow);
    }

    let (a, b) = match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(unsupported()),
    };
    match op {
        BinaryOp::Add => Ok(Value::Float(a + b)),
        BinaryOp::Sub => Ok(Value::Float(a - b)),
        BinaryOp::Mul => Ok(Value::Float(a * b)),
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => Err(zero_division()),
        BinaryOp::Div => Ok(Value::Float(a / b)),
        BinaryOp::FloorDiv => Ok(Value::Float((a / b).floor())),
        BinaryOp::Mod => Ok(Value::Float(a - (a / b).floor() * b)),
        _ => Err(unsupported()),
    }
}

/// Division rounding towards negative infinity; `None` on overflow.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// Remainder taking the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> i64 {
    let remainder = a.wrapping_rem(b);
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        remainder + b
    } else {
        remainder
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            as_number(left) == as_number(right)
        }
        _ => left == right,
    }
}

/// Ordering of two values; `None` when either side is `nothing`.
fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>, EvalError> {
    match (left, right) {
        (Value::Nothing, _) | (_, Value::Nothing) => Ok(None),
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Some(Ordering::Equal) => continue,
                    other => return Ok(other),
                }
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(EvalError::type_error(format!(
                "cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::List(items), item) => Ok(items.iter().any(|candidate| equals(candidate, item))),
        (Value::Map(map), Value::Str(key)) => Ok(map.contains_key(key)),
        (Value::Nothing, _) => Ok(false),
        (container, item) => Err(EvalError::type_error(format!(
            "'in' requires a container, got {} in {}",
            item.type_name(),
            container.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runtime(libraries: &[&str]) -> HostRuntime {
        HostRuntime::new(FunctionRegistry::with_libraries(libraries.iter().copied()).unwrap())
    }

    fn eval(code: &str, scope: &Scope) -> Result<Value, EvalError> {
        let mut host = runtime(&["text", "math", "seq"]);
        host.prepare(code).unwrap();
        host.evaluate_host(code, scope)
    }

    fn scope() -> Scope {
        Scope::new([
            ("n", Value::Int(5)),
            ("name", Value::from("Ada")),
            ("user", Value::from(json!({"tags": ["x", "y"], "age": 36}))),
            ("missing", Value::Nothing),
        ])
    }

    #[test]
    fn test_arithmetic() {
        let scope = scope();
        assert_eq!(eval("n - 1", &scope).unwrap(), Value::Int(4));
        assert_eq!(eval("n / 2", &scope).unwrap(), Value::Float(2.5));
        assert_eq!(eval("n // 2", &scope).unwrap(), Value::Int(2));
        assert_eq!(eval("-7 % 3", &scope).unwrap(), Value::Int(2));
        assert_eq!(eval("7 // -2", &scope).unwrap(), Value::Int(-4));
        assert_eq!(eval("n * 1.5", &scope).unwrap(), Value::Float(7.5));
        assert_eq!(eval("'a' + name", &scope).unwrap(), Value::from("aAda"));
        assert!(matches!(eval("n / 0", &scope), Err(EvalError::Type(_))));
        assert!(matches!(eval("name - 1", &scope), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let scope = Scope::new([("low", Value::Int(i64::MIN)), ("high", Value::Int(i64::MAX))]);
        assert!(matches!(eval("-low", &scope), Err(EvalError::Type(_))));
        assert!(matches!(eval("high + 1", &scope), Err(EvalError::Type(_))));
        assert!(matches!(eval("low - 1", &scope), Err(EvalError::Type(_))));
        assert!(matches!(eval("high * 2", &scope), Err(EvalError::Type(_))));
        assert!(matches!(eval("low // -1", &scope), Err(EvalError::Type(_))));
        assert_eq!(eval("-high", &scope).unwrap(), Value::Int(-i64::MAX));
        assert_eq!(eval("low % -1", &scope).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_comparisons() {
        let scope = scope();
        assert_eq!(eval("n > 1", &scope).unwrap(), Value::Bool(true));
        assert_eq!(eval("n == 5.0", &scope).unwrap(), Value::Bool(true));
        assert_eq!(eval("missing < 3", &scope).unwrap(), Value::Bool(false));
        assert_eq!(eval("'x' in user.tags", &scope).unwrap(), Value::Bool(true));
        assert_eq!(eval("'z' not in user.tags", &scope).unwrap(), Value::Bool(true));
        assert_eq!(eval("'age' in user", &scope).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_boolean_operators_return_operands() {
        let scope = scope();
        assert_eq!(eval("missing or 'fallback'", &scope).unwrap(), Value::from("fallback"));
        assert_eq!(eval("n and name", &scope).unwrap(), Value::from("Ada"));
        assert_eq!(eval("not n", &scope).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_members_and_indexing() {
        let scope = scope();
        assert_eq!(eval("user.age + 1", &scope).unwrap(), Value::Int(37));
        assert_eq!(eval("user.tags[-1]", &scope).unwrap(), Value::from("y"));
        assert_eq!(eval("user['age']", &scope).unwrap(), Value::Int(36));
        assert!(matches!(
            eval("user.height", &scope),
            Err(EvalError::PathNavigation { .. })
        ));
        assert!(matches!(
            eval("undefined_name", &scope),
            Err(EvalError::UndefinedVariable(_))
        ));
    }

    #[test]
    fn test_calls() {
        let scope = scope();
        assert_eq!(eval("name.upper()", &scope).unwrap(), Value::from("ADA"));
        assert_eq!(eval("len(user.tags)", &scope).unwrap(), Value::Int(2));
        assert_eq!(
            eval("join(sorted(['b', 'a']), '+')", &scope).unwrap(),
            Value::from("a+b")
        );
    }

    #[test]
    fn test_prepare_rejects_unknown_functions() {
        let mut host = runtime(&[]);
        assert_eq!(
            host.prepare("upper(name)"),
            Err(HostError::UnknownFunction("upper".into()))
        );
        assert!(matches!(host.prepare("1 +"), Err(HostError::Syntax { .. })));
        assert!(host.is_empty());
    }

    #[test]
    fn test_unprepared_code_is_parsed_on_demand() {
        let host = runtime(&[]);
        assert_eq!(
            host.evaluate_host("n + 1", &scope()).unwrap(),
            Value::Int(6)
        );
        assert!(matches!(
            host.evaluate_host("n +", &scope()),
            Err(EvalError::Host(_))
        ));
    }
}
