use crate::executor::ProgramExecutor;
use quick_xml::escape::{escape, partial_escape};
use talc_template_core::{Expr, Omit, Operation, RenderError, StaticAttribute, TagOp};
use talc_tales::Value;

pub(crate) fn handle_emit_expression<'p>(
    executor: &mut ProgramExecutor<'p>,
    expr: &Expr,
    structure: bool,
    default: &'p [Operation],
) -> Result<(), RenderError> {
    match executor.evaluate(expr)? {
        Value::Default => executor.execute_block(default),
        value => emit_value(executor, &value, structure),
    }
}

/// Writes `value` as content: raw for `structure`, escaped otherwise.
/// `nothing` writes nothing.
pub(crate) fn emit_value(
    executor: &mut ProgramExecutor<'_>,
    value: &Value,
    structure: bool,
) -> Result<(), RenderError> {
    if value.is_nothing() {
        return Ok(());
    }
    let text = executor.formatter.format(value);
    if structure {
        executor.out.push_str(&text);
    } else {
        executor.out.push_str(&partial_escape(text.as_str()));
    }
    Ok(())
}

pub(crate) fn handle_element<'p>(
    executor: &mut ProgramExecutor<'p>,
    tag: &'p TagOp,
    body: &'p [Operation],
) -> Result<(), RenderError> {
    let omit = match &tag.omit {
        Omit::Never => false,
        Omit::Always => true,
        Omit::When(expr) => executor.evaluate(expr)?.is_truthy(),
    };
    if !omit {
        let start = start_tag(executor, tag)?;
        executor.out.push_str(&start);
    }
    executor.execute_block(body)?;
    if !omit && let Some(end) = &tag.end {
        executor.out.push_str(end);
    }
    Ok(())
}

/// Renders the start tag with every attribute rewrite applied.
fn start_tag(executor: &ProgramExecutor<'_>, tag: &TagOp) -> Result<String, RenderError> {
    let mut rewritten: Vec<(&str, Value)> = Vec::with_capacity(tag.rewrites.len());
    for rewrite in &tag.rewrites {
        let value = executor.evaluate(&rewrite.expr)?;
        match rewritten.iter_mut().find(|(name, _)| *name == rewrite.name) {
            Some(slot) => slot.1 = value,
            None => rewritten.push((&rewrite.name, value)),
        }
    }

    let mut out = String::with_capacity(tag.name.len() + 32);
    out.push('<');
    out.push_str(&tag.name);
    for attribute in &tag.attributes {
        match rewritten.iter().position(|(name, _)| *name == attribute.name) {
            Some(index) => {
                let (_, value) = rewritten.remove(index);
                write_rewritten(executor, &mut out, attribute, &value);
            }
            None => attribute.write_to(&mut out),
        }
    }
    for (name, value) in rewritten {
        if let Some(text) = attribute_text(executor, name, &value) {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&text);
            out.push('"');
        }
    }
    out.push_str(&tag.close);
    Ok(out)
}

fn write_rewritten(
    executor: &ProgramExecutor<'_>,
    out: &mut String,
    attribute: &StaticAttribute,
    value: &Value,
) {
    if value.is_default() {
        attribute.write_to(out);
        return;
    }
    let Some(text) = attribute_text(executor, &attribute.name, value) else {
        return;
    };
    let quote = attribute.quote.unwrap_or('"');
    out.push_str(&attribute.leading);
    out.push_str(&attribute.name);
    out.push_str(attribute.equals.as_deref().unwrap_or("="));
    out.push(quote);
    out.push_str(&text);
    out.push(quote);
}

/// The escaped attribute value, or `None` when the attribute is dropped.
fn attribute_text(executor: &ProgramExecutor<'_>, name: &str, value: &Value) -> Option<String> {
    match value {
        Value::Nothing | Value::Default | Value::Bool(false) => None,
        Value::Bool(true) => Some(escape(name).into_owned()),
        other => Some(escape(executor.formatter.format(other).as_str()).into_owned()),
    }
}
