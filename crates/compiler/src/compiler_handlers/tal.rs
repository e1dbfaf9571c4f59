//! Handlers for `tal:define`, `tal:condition`, `tal:repeat` and `tal:on-error`.

use super::handler_expr;
use crate::arguments::{compile_expr, parse_define, parse_repeat};
use crate::command::{CommandSet, TalKind};
use crate::compiler::ProgramBuilder;
use talc_markup::Location;
use talc_template_core::{Block, Operation, TemplateError};

impl ProgramBuilder<'_> {
    /// Wraps `core` in the element's scoping and control-flow commands.
    ///
    /// Nesting from the inside out: repeat, condition, define, on-error,
    /// so define runs first and on-error guards everything.
    pub(crate) fn wrap_tal(
        &self,
        core: Block,
        commands: &CommandSet,
    ) -> Result<Block, TemplateError> {
        let mut block = core;
        if let Some(command) = commands.tal(TalKind::Repeat) {
            block = self.handle_repeat(&command.argument, &command.location, block)?;
        }
        if let Some(command) = commands.tal(TalKind::Condition) {
            block = self.handle_condition(&command.argument, &command.location, block)?;
        }
        if let Some(command) = commands.tal(TalKind::Define) {
            block = self.handle_define(&command.argument, &command.location, block)?;
        }
        if let Some(command) = commands.tal(TalKind::OnError) {
            block = self.handle_on_error(&command.argument, &command.location, block)?;
        }
        Ok(block)
    }

    pub(crate) fn handle_define(
        &self,
        argument: &str,
        location: &Location,
        body: Block,
    ) -> Result<Block, TemplateError> {
        let definitions = parse_define(argument, location)?;
        let mut block = Vec::with_capacity(body.len() + definitions.len() + 2);
        block.push(Operation::PushScope);
        block.extend(definitions.into_iter().map(|d| Operation::Define {
            kind: d.kind,
            name: d.name,
            expr: d.expr,
        }));
        block.extend(body);
        block.push(Operation::PopScope);
        Ok(block)
    }

    pub(crate) fn handle_condition(
        &self,
        argument: &str,
        location: &Location,
        body: Block,
    ) -> Result<Block, TemplateError> {
        Ok(vec![Operation::Condition {
            test: compile_expr(argument, location)?,
            body,
        }])
    }

    pub(crate) fn handle_repeat(
        &self,
        argument: &str,
        location: &Location,
        body: Block,
    ) -> Result<Block, TemplateError> {
        let (variable, items) = parse_repeat(argument, location)?;
        Ok(vec![Operation::Repeat {
            variable,
            items,
            body,
        }])
    }

    pub(crate) fn handle_on_error(
        &self,
        argument: &str,
        location: &Location,
        body: Block,
    ) -> Result<Block, TemplateError> {
        let (structure, handler) = handler_expr(argument, location)?;
        Ok(vec![Operation::OnError {
            body,
            handler,
            structure,
        }])
    }
}
