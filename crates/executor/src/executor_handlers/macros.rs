use crate::executor::{Invocation, ProgramExecutor};
use talc_markup::Location;
use talc_template_core::{
    Expr, MacroBlock, MacroTarget, Operation, ParamFill, ParamValue, RenderError,
    RenderErrorKind, SlotFill,
};
use talc_tales::Value;

pub(crate) fn handle_call_macro<'p>(
    executor: &mut ProgramExecutor<'p>,
    target: &MacroTarget,
    fills: &'p [SlotFill],
    params: &[ParamFill],
    location: &Location,
) -> Result<(), RenderError> {
    let id = match target {
        MacroTarget::Static(id) => *id,
        MacroTarget::Dynamic(expr) => match executor.evaluate(expr)? {
            Value::Macro(handle) => handle.id,
            other => return Err(not_a_macro(expr, &other)),
        },
    };
    let program = executor.program;
    let block = program.macros.get(id).ok_or_else(|| {
        RenderError::new(
            RenderErrorKind::MacroResolution,
            format!("no macro with id {}", id),
            Some(location),
        )
    })?;
    log::trace!("Calling macro '{}'", block.name);

    let bindings = bind_params(executor, block, params, location)?;

    executor.invocations.push(Invocation {
        fills,
        caller: executor.current,
    });
    let saved = executor.current;
    executor.current = Some(executor.invocations.len() - 1);
    executor.scope.push();
    for (name, value) in bindings {
        executor.scope.define_local(name, value);
    }

    executor.execute_block(&block.body)?;

    executor.scope.pop();
    executor.current = saved;
    executor.invocations.pop();
    Ok(())
}

/// Evaluates parameter values in the caller's scope and coerces them to
/// their declared types.
fn bind_params<'b>(
    executor: &ProgramExecutor<'_>,
    block: &'b MacroBlock,
    params: &[ParamFill],
    location: &Location,
) -> Result<Vec<(&'b str, Value)>, RenderError> {
    if let Some(unknown) = params.iter().find(|p| block.param(&p.name).is_none()) {
        return Err(RenderError::new(
            RenderErrorKind::MacroResolution,
            format!("macro '{}' has no parameter '{}'", block.name, unknown.name),
            Some(location),
        ));
    }

    let mut bindings = Vec::with_capacity(block.params.len());
    for spec in &block.params {
        let explicit = params
            .iter()
            .find(|p| p.name == spec.name)
            .and_then(|p| match &p.value {
                ParamValue::Expr(expr) => Some(expr),
                ParamValue::Default => None,
            });
        let (value, source) = match (explicit, &spec.default) {
            (Some(expr), _) | (None, Some(expr)) => (executor.evaluate(expr)?, Some(expr)),
            (None, None) => (Value::Nothing, None),
        };
        let value = spec.type_tag.coerce(value).map_err(|err| {
            let text = format!(
                "{} (parameter '{}')",
                source.map_or("", |e| e.text.as_str()),
                spec.name
            );
            RenderError::evaluation(err, &text, source.map_or(location, |e| &e.location))
        })?;
        bindings.push((spec.name.as_str(), value));
    }
    Ok(bindings)
}

pub(crate) fn handle_define_slot<'p>(
    executor: &mut ProgramExecutor<'p>,
    name: &str,
    default: &'p [Operation],
) -> Result<(), RenderError> {
    let filled = executor.current.and_then(|index| {
        let Invocation { fills, caller } = *executor.invocations.get(index)?;
        let fill = fills.iter().find(|fill| fill.name == name)?;
        Some((fill, caller))
    });
    let Some((fill, caller)) = filled else {
        return executor.execute_block(default);
    };

    log::trace!("Filling slot '{}'", name);
    let saved = executor.current;
    executor.current = caller;
    executor.execute_block(&fill.body)?;
    executor.current = saved;
    Ok(())
}

fn not_a_macro(expr: &Expr, value: &Value) -> RenderError {
    RenderError::new(
        RenderErrorKind::MacroResolution,
        format!(
            "'{}' evaluated to a {} value, not a macro",
            expr.text,
            value.type_name()
        ),
        Some(&expr.location),
    )
}
