//! Walks a [`Program`] and writes its output.
//!
//! The executor keeps three stacks in step: the TALES scope chain, the
//! macro invocation records that hold slot fills, and the output buffer.
//! `on-error` restores all three to the marks taken when its body started.

use crate::executor_handlers::{control_flow, literals, macros, variables};
use crate::host::HostRuntime;
use talc_template_core::{Expr, Operation, Program, RenderError, SlotFill, ValueFormatter};
use talc_tales::{EvaluationContext, Scope, Value, evaluate};

/// Remaining stack below which a block continues on a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each segment allocated for deeply nested blocks.
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// One active macro call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Invocation<'p> {
    pub(crate) fills: &'p [SlotFill],
    /// The invocation whose body contained the `use-macro`; `None` for the main template.
    pub(crate) caller: Option<usize>,
}

pub struct ProgramExecutor<'p> {
    pub(crate) program: &'p Program,
    pub(crate) host: &'p HostRuntime,
    pub(crate) formatter: &'p dyn ValueFormatter,
    pub(crate) scope: Scope,
    pub(crate) out: String,
    pub(crate) invocations: Vec<Invocation<'p>>,
    /// The invocation whose fills `define-slot` consults.
    pub(crate) current: Option<usize>,
}

impl<'p> ProgramExecutor<'p> {
    pub fn new(
        program: &'p Program,
        host: &'p HostRuntime,
        formatter: &'p dyn ValueFormatter,
        scope: Scope,
    ) -> Self {
        Self {
            program,
            host,
            formatter,
            scope,
            out: String::new(),
            invocations: Vec::new(),
            current: None,
        }
    }

    /// Runs the program's main body and returns the produced text.
    pub fn run(mut self) -> Result<String, RenderError> {
        let program = self.program;
        self.execute_block(&program.body)?;
        Ok(self.out)
    }

    /// Runs a block of operations.
    ///
    /// Macro calls and nested elements re-enter here, so recursion depth is
    /// bounded by memory rather than by the thread's stack.
    pub(crate) fn execute_block(&mut self, block: &'p [Operation]) -> Result<(), RenderError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            for op in block {
                self.execute_op(op)?;
            }
            Ok(())
        })
    }

    fn execute_op(&mut self, op: &'p Operation) -> Result<(), RenderError> {
        match op {
            Operation::EmitLiteral(text) => {
                self.out.push_str(text);
                Ok(())
            }
            Operation::EmitExpression {
                expr,
                structure,
                default,
            } => literals::handle_emit_expression(self, expr, *structure, default),
            Operation::PushScope => {
                self.scope.push();
                Ok(())
            }
            Operation::PopScope => {
                self.scope.pop();
                Ok(())
            }
            Operation::Define { kind, name, expr } => {
                variables::handle_define(self, *kind, name, expr)
            }
            Operation::Condition { test, body } => control_flow::handle_condition(self, test, body),
            Operation::Repeat {
                variable,
                items,
                body,
            } => control_flow::handle_repeat(self, variable, items, body),
            Operation::Element { tag, body } => literals::handle_element(self, tag, body),
            Operation::OnError {
                body,
                handler,
                structure,
            } => control_flow::handle_on_error(self, body, handler, *structure),
            Operation::CallMacro {
                target,
                fills,
                params,
                location,
            } => macros::handle_call_macro(self, target, fills, params, location),
            Operation::DefineSlot { name, default } => {
                macros::handle_define_slot(self, name, default)
            }
        }
    }

    pub(crate) fn evaluate(&self, expr: &Expr) -> Result<Value, RenderError> {
        let e_ctx = EvaluationContext::new(&self.scope, self.host);
        log::trace!("Evaluating '{}' at {}", expr.text, expr.location);
        evaluate(&expr.expression, &e_ctx)
            .map_err(|err| RenderError::evaluation(err, &expr.text, &expr.location))
    }
}
