//! Function libraries available to `host:` expressions.
//!
//! `core` is always loaded. The other libraries are enabled by naming them
//! as template dependencies.
use std::collections::HashMap;
use talc_tales::{EvalError, Value};

/// The signature of a host function implementation.
pub type HostFunction = fn(args: &[Value]) -> Result<Value, EvalError>;

pub const CORE_LIBRARY: &str = "core";

/// Names of the libraries a template may depend on.
pub const LIBRARIES: &[&str] = &[CORE_LIBRARY, "text", "math", "seq"];

/// A registry to hold the functions enabled for one program.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, HostFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// A registry with `core` plus the named libraries.
    ///
    /// Returns the first unknown library name as the error.
    pub fn with_libraries<'a, I>(libraries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut registry = Self::new();
        registry.load_library(CORE_LIBRARY)?;
        for library in libraries {
            registry.load_library(library)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, func: HostFunction) {
        self.functions.insert(name.to_string(), func);
    }

    pub fn get(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn load_library(&mut self, library: &str) -> Result<(), String> {
        let entries: &[(&str, HostFunction)] = match library {
            CORE_LIBRARY => &[
                ("len", len),
                ("str", to_str),
                ("int", to_int),
                ("float", to_float),
                ("bool", to_bool),
                ("range", range),
            ],
            "text" => &[
                ("upper", upper),
                ("lower", lower),
                ("strip", strip),
                ("title", title),
                ("replace", replace),
                ("split", split),
                ("join", join),
                ("startswith", starts_with),
                ("endswith", ends_with),
            ],
            "math" => &[
                ("abs", abs),
                ("min", min),
                ("max", max),
                ("round", round),
                ("floor", floor),
                ("ceil", ceil),
                ("sum", sum),
            ],
            "seq" => &[
                ("sorted", sorted),
                ("reversed", reversed),
                ("first", first),
                ("last", last),
                ("slice", slice),
                ("enumerate", enumerate),
            ],
            other => return Err(other.to_string()),
        };
        for (name, func) in entries {
            self.register(name, *func);
        }
        Ok(())
    }
}

// --- Argument helpers ---

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::type_error(format!(
            "{}() takes {} argument(s) but {} were given",
            name,
            expected,
            args.len()
        )))
    }
}

fn text_arg<'v>(name: &str, value: &'v Value) -> Result<&'v str, EvalError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::type_error(format!(
            "{}() expects a string, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn list_arg<'v>(name: &str, value: &'v Value) -> Result<&'v [Value], EvalError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(EvalError::type_error(format!(
            "{}() expects a list, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn int_arg(name: &str, value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(EvalError::type_error(format!(
            "{}() expects an integer, got {}",
            name,
            other.type_name()
        ))),
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

// --- core ---

fn len(args: &[Value]) -> Result<Value, EvalError> {
    arity("len", args, 1)?;
    let length = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(EvalError::type_error(format!(
                "object of type {} has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::from(length))
}

fn to_str(args: &[Value]) -> Result<Value, EvalError> {
    arity("str", args, 1)?;
    Ok(Value::Str(args[0].to_text()))
}

fn to_int(args: &[Value]) -> Result<Value, EvalError> {
    arity("int", args, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::type_error(format!("invalid literal for int(): '{}'", s))),
        other => Err(EvalError::type_error(format!(
            "int() cannot convert {}",
            other.type_name()
        ))),
    }
}

fn to_float(args: &[Value]) -> Result<Value, EvalError> {
    arity("float", args, 1)?;
    match &args[0] {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| EvalError::type_error(format!("invalid literal for float(): '{}'", s))),
        other => as_number(other).map(Value::Float).ok_or_else(|| {
            EvalError::type_error(format!("float() cannot convert {}", other.type_name()))
        }),
    }
}

fn to_bool(args: &[Value]) -> Result<Value, EvalError> {
    arity("bool", args, 1)?;
    Ok(Value::Bool(args[0].is_truthy()))
}

fn range(args: &[Value]) -> Result<Value, EvalError> {
    let (start, stop) = match args {
        [stop] => (0, int_arg("range", stop)?),
        [start, stop] => (int_arg("range", start)?, int_arg("range", stop)?),
        _ => return Err(EvalError::type_error("range() takes 1 or 2 arguments")),
    };
    Ok(Value::List((start..stop).map(Value::Int).collect()))
}

// --- text ---

fn upper(args: &[Value]) -> Result<Value, EvalError> {
    arity("upper", args, 1)?;
    Ok(Value::Str(text_arg("upper", &args[0])?.to_uppercase()))
}

fn lower(args: &[Value]) -> Result<Value, EvalError> {
    arity("lower", args, 1)?;
    Ok(Value::Str(text_arg("lower", &args[0])?.to_lowercase()))
}

fn strip(args: &[Value]) -> Result<Value, EvalError> {
    arity("strip", args, 1)?;
    Ok(Value::from(text_arg("strip", &args[0])?.trim()))
}

fn title(args: &[Value]) -> Result<Value, EvalError> {
    arity("title", args, 1)?;
    let mut out = String::new();
    let mut at_word_start = true;
    for c in text_arg("title", &args[0])?.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = !c.is_alphanumeric();
    }
    Ok(Value::Str(out))
}

fn replace(args: &[Value]) -> Result<Value, EvalError> {
    arity("replace", args, 3)?;
    let text = text_arg("replace", &args[0])?;
    let from = text_arg("replace", &args[1])?;
    let to = text_arg("replace", &args[2])?;
    Ok(Value::Str(text.replace(from, to)))
}

fn split(args: &[Value]) -> Result<Value, EvalError> {
    let parts: Vec<Value> = match args {
        [text] => text_arg("split", text)?
            .split_whitespace()
            .map(Value::from)
            .collect(),
        [text, separator] => text_arg("split", text)?
            .split(text_arg("split", separator)?)
            .map(Value::from)
            .collect(),
        _ => return Err(EvalError::type_error("split() takes 1 or 2 arguments")),
    };
    Ok(Value::List(parts))
}

fn join(args: &[Value]) -> Result<Value, EvalError> {
    arity("join", args, 2)?;
    let items = list_arg("join", &args[0])?;
    let separator = text_arg("join", &args[1])?;
    Ok(Value::Str(
        items
            .iter()
            .map(Value::to_text)
            .collect::<Vec<_>>()
            .join(separator),
    ))
}

fn starts_with(args: &[Value]) -> Result<Value, EvalError> {
    arity("startswith", args, 2)?;
    let text = text_arg("startswith", &args[0])?;
    Ok(Value::Bool(text.starts_with(text_arg("startswith", &args[1])?)))
}

fn ends_with(args: &[Value]) -> Result<Value, EvalError> {
    arity("endswith", args, 2)?;
    let text = text_arg("endswith", &args[0])?;
    Ok(Value::Bool(text.ends_with(text_arg("endswith", &args[1])?)))
}

// --- math ---

fn numeric(name: &str, value: &Value) -> Result<f64, EvalError> {
    as_number(value).ok_or_else(|| {
        EvalError::type_error(format!(
            "{}() expects a number, got {}",
            name,
            value.type_name()
        ))
    })
}

fn abs(args: &[Value]) -> Result<Value, EvalError> {
    arity("abs", args, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        other => Ok(Value::Float(numeric("abs", other)?.abs())),
    }
}

/// Arguments of `min`/`max`: either several values or one list.
fn extremum_candidates<'v>(name: &str, args: &'v [Value]) -> Result<&'v [Value], EvalError> {
    let candidates = match args {
        [Value::List(items)] => items.as_slice(),
        many => many,
    };
    if candidates.is_empty() {
        return Err(EvalError::type_error(format!("{}() arg is an empty sequence", name)));
    }
    Ok(candidates)
}

fn extremum(name: &str, args: &[Value], prefer: std::cmp::Ordering) -> Result<Value, EvalError> {
    let candidates = extremum_candidates(name, args)?;
    let mut best = &candidates[0];
    for candidate in &candidates[1..] {
        let ordering = numeric(name, candidate)?
            .partial_cmp(&numeric(name, best)?)
            .unwrap_or(std::cmp::Ordering::Equal);
        if ordering == prefer {
            best = candidate;
        }
    }
    numeric(name, best)?;
    Ok(best.clone())
}

fn min(args: &[Value]) -> Result<Value, EvalError> {
    extremum("min", args, std::cmp::Ordering::Less)
}

fn max(args: &[Value]) -> Result<Value, EvalError> {
    extremum("max", args, std::cmp::Ordering::Greater)
}

fn round(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [value] => Ok(Value::Int(numeric("round", value)?.round() as i64)),
        [value, digits] => {
            let factor = 10f64.powi(int_arg("round", digits)? as i32);
            Ok(Value::Float((numeric("round", value)? * factor).round() / factor))
        }
        _ => Err(EvalError::type_error("round() takes 1 or 2 arguments")),
    }
}

fn floor(args: &[Value]) -> Result<Value, EvalError> {
    arity("floor", args, 1)?;
    Ok(Value::Int(numeric("floor", &args[0])?.floor() as i64))
}

fn ceil(args: &[Value]) -> Result<Value, EvalError> {
    arity("ceil", args, 1)?;
    Ok(Value::Int(numeric("ceil", &args[0])?.ceil() as i64))
}

fn sum(args: &[Value]) -> Result<Value, EvalError> {
    arity("sum", args, 1)?;
    let items = list_arg("sum", &args[0])?;
    if items.iter().all(|v| matches!(v, Value::Int(_) | Value::Bool(_))) {
        let mut total = 0i64;
        for item in items {
            total = total.saturating_add(int_arg("sum", item)?);
        }
        return Ok(Value::Int(total));
    }
    let mut total = 0.0;
    for item in items {
        total += numeric("sum", item)?;
    }
    Ok(Value::Float(total))
}

// --- seq ---

fn sort_key(value: &Value) -> Result<SortKey<'_>, EvalError> {
    match value {
        Value::Str(s) => Ok(SortKey::Text(s)),
        other => as_number(other).map(SortKey::Number).ok_or_else(|| {
            EvalError::type_error(format!("cannot sort {} values", other.type_name()))
        }),
    }
}

#[derive(PartialEq, PartialOrd)]
enum SortKey<'v> {
    Number(f64),
    Text(&'v str),
}

fn sorted(args: &[Value]) -> Result<Value, EvalError> {
    arity("sorted", args, 1)?;
    let items = list_arg("sorted", &args[0])?;
    let mut keyed = items
        .iter()
        .map(|item| Ok((sort_key(item)?, item)))
        .collect::<Result<Vec<_>, EvalError>>()?;
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(Value::List(keyed.into_iter().map(|(_, v)| v.clone()).collect()))
}

fn reversed(args: &[Value]) -> Result<Value, EvalError> {
    arity("reversed", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Str(s.chars().rev().collect())),
        other => Ok(Value::List(
            list_arg("reversed", other)?.iter().rev().cloned().collect(),
        )),
    }
}

fn first(args: &[Value]) -> Result<Value, EvalError> {
    arity("first", args, 1)?;
    Ok(list_arg("first", &args[0])?.first().cloned().unwrap_or_default())
}

fn last(args: &[Value]) -> Result<Value, EvalError> {
    arity("last", args, 1)?;
    Ok(list_arg("last", &args[0])?.last().cloned().unwrap_or_default())
}

fn slice(args: &[Value]) -> Result<Value, EvalError> {
    arity("slice", args, 3)?;
    let items = list_arg("slice", &args[0])?;
    let clamp = |i: i64| -> usize {
        let len = items.len() as i64;
        let index = if i < 0 { len + i } else { i };
        index.clamp(0, len) as usize
    };
    let start = clamp(int_arg("slice", &args[1])?);
    let stop = clamp(int_arg("slice", &args[2])?);
    Ok(Value::List(
        items.get(start..stop.max(start)).unwrap_or_default().to_vec(),
    ))
}

fn enumerate(args: &[Value]) -> Result<Value, EvalError> {
    arity("enumerate", args, 1)?;
    Ok(Value::List(
        list_arg("enumerate", &args[0])?
            .iter()
            .enumerate()
            .map(|(i, v)| Value::List(vec![Value::from(i), v.clone()]))
            .collect(),
    ))
}
