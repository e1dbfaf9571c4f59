use crate::executor::ProgramExecutor;
use talc_template_core::{DefineKind, Expr, RenderError};

pub(crate) fn handle_define(
    executor: &mut ProgramExecutor<'_>,
    kind: DefineKind,
    name: &str,
    expr: &Expr,
) -> Result<(), RenderError> {
    let value = executor.evaluate(expr)?;
    match kind {
        DefineKind::Local => executor.scope.define_local(name, value),
        DefineKind::Global => executor.scope.define_global(name, value),
        DefineKind::Set => executor
            .scope
            .set(name, value)
            .map_err(|err| RenderError::evaluation(err, &expr.text, &expr.location))?,
    }
    Ok(())
}
