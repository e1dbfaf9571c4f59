//! The portable render program.
//!
//! A program is a tree of [`Operation`] blocks plus an arena of macro bodies
//! addressed by index. Macro invocations refer to the arena, so recursive
//! macros never copy their bodies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use talc_markup::Location;
use talc_tales::{EvalError, Expression, MacroRef, Value};

pub type Block = Vec<Operation>;

/// An expression together with its source text and position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub text: String,
    pub expression: Expression,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefineKind {
    Local,
    Global,
    Set,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Omit {
    Never,
    Always,
    When(Expr),
}

/// An attribute carried over from the source tag unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAttribute {
    pub name: String,
    pub leading: String,
    pub equals: Option<String>,
    pub value: Option<String>,
    pub quote: Option<char>,
}

impl StaticAttribute {
    pub fn write_to(&self, out: &mut String) {
        out.push_str(&self.leading);
        out.push_str(&self.name);
        if let Some(value) = &self.value {
            out.push_str(self.equals.as_deref().unwrap_or("="));
            match self.quote {
                Some(q) => {
                    out.push(q);
                    out.push_str(value);
                    out.push(q);
                }
                None => out.push_str(value),
            }
        }
    }
}

/// `tal:attributes` entry: later entries for the same name win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRewrite {
    pub name: String,
    pub expr: Expr,
}

/// A start/end tag pair that is regenerated at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagOp {
    pub name: String,
    pub attributes: Vec<StaticAttribute>,
    pub rewrites: Vec<AttributeRewrite>,
    /// `>`, `/>` or ` />` as written.
    pub close: String,
    /// The end tag text; `None` for self-closing and unclosed elements.
    pub end: Option<String>,
    pub omit: Omit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MacroTarget {
    /// Resolved while compiling: an index into [`Program::macros`].
    Static(usize),
    /// Evaluated at render time; must yield a macro handle.
    Dynamic(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotFill {
    pub name: String,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Expr(Expr),
    /// `fill-param="NAME default"`: use the macro's own default.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamFill {
    pub name: String,
    pub value: ParamValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    EmitLiteral(String),
    /// Emits a value; `default` runs `default`, `nothing` emits nothing.
    EmitExpression {
        expr: Expr,
        structure: bool,
        default: Block,
    },
    PushScope,
    PopScope,
    Define {
        kind: DefineKind,
        name: String,
        expr: Expr,
    },
    /// Skips `body` unless `test` is truthy.
    Condition {
        test: Expr,
        body: Block,
    },
    /// Runs `body` once per item with `variable` and `repeat/variable` bound.
    Repeat {
        variable: String,
        items: Expr,
        body: Block,
    },
    Element {
        tag: TagOp,
        body: Block,
    },
    /// Renders `handler` in place of `body` if `body` fails.
    OnError {
        body: Block,
        handler: Expr,
        structure: bool,
    },
    CallMacro {
        target: MacroTarget,
        fills: Vec<SlotFill>,
        params: Vec<ParamFill>,
        location: Location,
    },
    /// Runs the caller's fill for `name`, or `default` if there is none.
    DefineSlot {
        name: String,
        default: Block,
    },
}

/// Declared type of a macro parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Int,
    Float,
    Str,
    Bool,
    List,
    Map,
    Any,
}

impl TypeTag {
    pub fn parse(tag: &str) -> Option<TypeTag> {
        match tag {
            "int" | "integer" => Some(TypeTag::Int),
            "float" | "number" => Some(TypeTag::Float),
            "str" | "string" | "text" => Some(TypeTag::Str),
            "bool" | "boolean" => Some(TypeTag::Bool),
            "list" | "sequence" => Some(TypeTag::List),
            "map" | "dict" => Some(TypeTag::Map),
            "any" | "object" => Some(TypeTag::Any),
            _ => None,
        }
    }

    /// Converts a bound value to this type. `nothing` is accepted by every type.
    pub fn coerce(&self, value: Value) -> Result<Value, EvalError> {
        let mismatch = |value: &Value| {
            EvalError::type_error(format!(
                "expected {:?} but got a {} value",
                self,
                value.type_name()
            ))
        };
        match (self, value) {
            (_, Value::Nothing) => Ok(Value::Nothing),
            (TypeTag::Any, value) => Ok(value),
            (TypeTag::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (TypeTag::Int, Value::Float(f)) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
            (TypeTag::Int, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
            (TypeTag::Int, Value::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| mismatch(&Value::Str(s))),
            (TypeTag::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (TypeTag::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (TypeTag::Float, Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(&Value::Str(s))),
            (TypeTag::Str, v @ (Value::Str(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_))) => {
                Ok(Value::Str(v.to_text()))
            }
            (TypeTag::Bool, v) => Ok(Value::Bool(v.is_truthy())),
            (TypeTag::List, Value::List(items)) => Ok(Value::List(items)),
            (TypeTag::Map, Value::Map(map)) => Ok(Value::Map(map)),
            (_, other) => Err(mismatch(&other)),
        }
    }
}

/// `define-param` entry of a macro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub type_tag: TypeTag,
    pub default: Option<Expr>,
}

impl ParamSpec {
    /// Parameters without a default bind `nothing` when not filled.
    pub fn is_nullable(&self) -> bool {
        self.default.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroBlock {
    pub name: String,
    /// Path of the template that defines the macro; `None` for the main template.
    pub template: Option<String>,
    pub params: Vec<ParamSpec>,
    pub body: Block,
    pub location: Location,
}

impl MacroBlock {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Block,
    pub macros: Vec<MacroBlock>,
    /// Macro names visible to the main template per import alias.
    /// The empty alias is the template's own namespace.
    pub namespaces: BTreeMap<String, BTreeMap<String, usize>>,
}

impl Program {
    /// Root-frame bindings exposing macros to expressions:
    /// `macros/NAME` and `ALIAS/macros/NAME`.
    pub fn macro_bindings(&self) -> Vec<(String, Value)> {
        self.namespaces
            .iter()
            .map(|(alias, entries)| {
                let handles: BTreeMap<String, Value> = entries
                    .iter()
                    .map(|(name, id)| {
                        (
                            name.clone(),
                            Value::Macro(MacroRef {
                                id: *id,
                                name: name.clone(),
                            }),
                        )
                    })
                    .collect();
                if alias.is_empty() {
                    ("macros".to_string(), Value::Map(handles))
                } else {
                    let mut wrapper = BTreeMap::new();
                    wrapper.insert("macros".to_string(), Value::Map(handles));
                    (alias.clone(), Value::Map(wrapper))
                }
            })
            .collect()
    }

    /// Visits every expression in the program, macro bodies included.
    pub fn visit_expressions(&self, visit: &mut dyn FnMut(&Expr)) {
        visit_block(&self.body, visit);
        for block in &self.macros {
            for param in &block.params {
                if let Some(default) = &param.default {
                    visit(default);
                }
            }
            visit_block(&block.body, visit);
        }
    }
}

fn visit_block(block: &[Operation], visit: &mut dyn FnMut(&Expr)) {
    for op in block {
        match op {
            Operation::EmitLiteral(_) | Operation::PushScope | Operation::PopScope => {}
            Operation::EmitExpression { expr, default, .. } => {
                visit(expr);
                visit_block(default, visit);
            }
            Operation::Define { expr, .. } => visit(expr),
            Operation::Condition { test, body } => {
                visit(test);
                visit_block(body, visit);
            }
            Operation::Repeat { items, body, .. } => {
                visit(items);
                visit_block(body, visit);
            }
            Operation::Element { tag, body } => {
                for rewrite in &tag.rewrites {
                    visit(&rewrite.expr);
                }
                if let Omit::When(expr) = &tag.omit {
                    visit(expr);
                }
                visit_block(body, visit);
            }
            Operation::OnError { body, handler, .. } => {
                visit_block(body, visit);
                visit(handler);
            }
            Operation::CallMacro {
                target,
                fills,
                params,
                ..
            } => {
                if let MacroTarget::Dynamic(expr) = target {
                    visit(expr);
                }
                for fill in fills {
                    visit_block(&fill.body, visit);
                }
                for param in params {
                    if let ParamValue::Expr(expr) = &param.value {
                        visit(expr);
                    }
                }
            }
            Operation::DefineSlot { default, .. } => visit_block(default, visit),
        }
    }
}
