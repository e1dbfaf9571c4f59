use crate::executor::ProgramExecutor;
use crate::executor_handlers::literals::emit_value;
use std::collections::BTreeMap;
use talc_template_core::{Expr, Operation, RenderError};
use talc_tales::{EvalError, Value};

pub(crate) fn handle_condition<'p>(
    executor: &mut ProgramExecutor<'p>,
    test: &Expr,
    body: &'p [Operation],
) -> Result<(), RenderError> {
    if executor.evaluate(test)?.is_truthy() {
        executor.execute_block(body)?;
    }
    Ok(())
}

pub(crate) fn handle_repeat<'p>(
    executor: &mut ProgramExecutor<'p>,
    variable: &str,
    items: &Expr,
    body: &'p [Operation],
) -> Result<(), RenderError> {
    let items = match executor.evaluate(items)? {
        Value::List(items) => items,
        Value::Map(map) => map.into_keys().map(Value::Str).collect(),
        Value::Str(text) => text.chars().map(|c| Value::Str(c.to_string())).collect(),
        Value::Nothing => Vec::new(),
        Value::Default => return executor.execute_block(body),
        other => {
            return Err(RenderError::evaluation(
                EvalError::type_error(format!("cannot iterate over a {} value", other.type_name())),
                &items.text,
                &items.location,
            ));
        }
    };

    let outer = match executor.scope.get("repeat") {
        Some(Value::Map(loops)) => loops.clone(),
        _ => BTreeMap::new(),
    };
    let length = items.len();
    log::trace!("Repeating '{}' over {} item(s)", variable, length);

    executor.scope.push();
    for (index, item) in items.into_iter().enumerate() {
        let mut loops = outer.clone();
        loops.insert(variable.to_string(), repeat_info(index, length));
        executor.scope.define_local(variable, item);
        executor.scope.define_local("repeat", Value::Map(loops));
        executor.execute_block(body)?;
    }
    executor.scope.pop();
    Ok(())
}

/// The `repeat/NAME` record for one iteration.
fn repeat_info(index: usize, length: usize) -> Value {
    let even = index % 2 == 0;
    let mut info = BTreeMap::new();
    info.insert("index".to_string(), Value::from(index));
    info.insert("number".to_string(), Value::from(index + 1));
    info.insert("even".to_string(), Value::Bool(even));
    info.insert("odd".to_string(), Value::Bool(!even));
    info.insert(
        "parity".to_string(),
        Value::from(if even { "even" } else { "odd" }),
    );
    info.insert("start".to_string(), Value::Bool(index == 0));
    info.insert("end".to_string(), Value::Bool(index + 1 == length));
    info.insert("first".to_string(), Value::Bool(index == 0));
    info.insert("last".to_string(), Value::Bool(index + 1 == length));
    info.insert("length".to_string(), Value::from(length));
    Value::Map(info)
}

/// Runs `body`; if it fails with a recoverable error, discards its output
/// and renders `handler` with `error` bound instead.
pub(crate) fn handle_on_error<'p>(
    executor: &mut ProgramExecutor<'p>,
    body: &'p [Operation],
    handler: &Expr,
    structure: bool,
) -> Result<(), RenderError> {
    let output_mark = executor.out.len();
    let scope_depth = executor.scope.depth();
    let invocation_depth = executor.invocations.len();
    let current = executor.current;

    let err = match executor.execute_block(body) {
        Ok(()) => return Ok(()),
        Err(err) if err.is_recoverable() => err,
        Err(err) => return Err(err),
    };
    log::debug!("Recovering from render error: {}", err);

    executor.out.truncate(output_mark);
    executor.scope.truncate(scope_depth);
    executor.invocations.truncate(invocation_depth);
    executor.current = current;

    let mut record = BTreeMap::new();
    record.insert("type".to_string(), Value::Str(err.type_name()));
    record.insert("value".to_string(), Value::Str(err.message.clone()));
    if let Some(location) = &err.location {
        record.insert("line".to_string(), Value::from(location.line));
        record.insert("column".to_string(), Value::from(location.column));
    }

    executor.scope.push();
    executor.scope.define_local("error", Value::Map(record));
    let result = executor.evaluate(handler).and_then(|value| match value {
        Value::Default => Ok(()),
        value => emit_value(executor, &value, structure),
    });
    executor.scope.pop();
    result
}
