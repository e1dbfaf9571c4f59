//! The interpreting [`CodeBackend`]: programs run directly from their
//! operation tree.

use crate::executor::ProgramExecutor;
use crate::host::{FunctionRegistry, HostError, HostRuntime};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use talc_markup::Location;
use talc_template_core::{
    CodeBackend, CompiledProgram, Program, RenderError, RenderErrorKind, RenderProcedure,
    TemplateError, TypeTag, ValueFormatter,
};
use talc_tales::{Scope, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct InterpreterBackend;

impl InterpreterBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CodeBackend for InterpreterBackend {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn compile(
        &self,
        compiled: &CompiledProgram,
    ) -> Result<Arc<dyn RenderProcedure>, TemplateError> {
        let functions =
            FunctionRegistry::with_libraries(compiled.dependencies.iter().map(String::as_str))
                .map_err(|name| {
                    TemplateError::compile(
                        HostError::UnknownLibrary(name).to_string(),
                        first_host_location(&compiled.program).as_ref(),
                    )
                })?;

        let mut host = HostRuntime::new(functions);
        let mut failure = None;
        compiled.program.visit_expressions(&mut |expr| {
            expr.expression.visit_host_code(&mut |code| {
                if failure.is_none()
                    && let Err(err) = host.prepare(code)
                {
                    failure = Some(TemplateError::compile(err.to_string(), Some(&expr.location)));
                }
            });
        });
        if let Some(err) = failure {
            return Err(err);
        }

        let mut globals = Vec::with_capacity(compiled.global_types.len());
        for (name, type_name) in &compiled.global_types {
            let type_tag = TypeTag::parse(type_name);
            if type_tag.is_none() {
                log::debug!(
                    "Global '{}' has type '{}', which is passed through unchecked",
                    name,
                    type_name
                );
            }
            globals.push((name.clone(), type_tag));
        }

        log::debug!(
            "Interpreter prepared {} host expression(s) for template {}",
            host.len(),
            compiled.key
        );
        Ok(Arc::new(InterpretedProgram {
            program: compiled.program.clone(),
            host,
            globals,
        }))
    }
}

/// Where the program first reaches for a host function.
fn first_host_location(program: &Program) -> Option<Location> {
    let mut found = None;
    program.visit_expressions(&mut |expr| {
        if found.is_some() {
            return;
        }
        let mut uses_host = false;
        expr.expression.visit_host_code(&mut |_| uses_host = true);
        if uses_host {
            found = Some(expr.location.clone());
        }
    });
    found
}

/// A program ready to render with the interpreter.
pub struct InterpretedProgram {
    program: Program,
    host: HostRuntime,
    /// Declared globals with their type when the type name is recognised.
    globals: Vec<(String, Option<TypeTag>)>,
}

impl fmt::Debug for InterpretedProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpretedProgram")
            .field("operations", &self.program.body.len())
            .field("macros", &self.program.macros.len())
            .field("host_expressions", &self.host.len())
            .finish()
    }
}

impl InterpretedProgram {
    /// The root frame: caller globals, declared globals and macro handles.
    fn root_scope(&self, globals: &HashMap<String, Value>) -> Result<Scope, RenderError> {
        let mut scope = Scope::new(
            globals
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        for (name, type_tag) in &self.globals {
            let value = globals.get(name).cloned().unwrap_or_default();
            let value = match type_tag {
                Some(tag) => tag.coerce(value).map_err(|err| {
                    RenderError::new(
                        RenderErrorKind::Type,
                        format!("global '{}': {}", name, err),
                        None,
                    )
                })?,
                None => value,
            };
            scope.define_global(name.clone(), value);
        }
        for (name, handles) in self.program.macro_bindings() {
            scope.define_global(name, handles);
        }
        Ok(scope)
    }
}

impl RenderProcedure for InterpretedProgram {
    fn render(
        &self,
        out: &mut dyn fmt::Write,
        globals: &HashMap<String, Value>,
        formatter: &dyn ValueFormatter,
    ) -> Result<(), RenderError> {
        let scope = self.root_scope(globals)?;
        let text = ProgramExecutor::new(&self.program, &self.host, formatter, scope).run()?;
        out.write_str(&text).map_err(RenderError::output)
    }
}
