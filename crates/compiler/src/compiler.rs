//! Program builder: walks a template tree in document order and emits
//! the operation blocks of a [`Program`].

use crate::command::{CommandSet, MetalKind};
use crate::macros::MacroRegistry;
use talc_markup::{Element, Node};
use talc_template_core::{Block, Operation, ParamSpec, TemplateError};

pub(crate) struct ProgramBuilder<'a> {
    pub(crate) registry: &'a MacroRegistry,
    /// Declared parameters per macro definition id.
    pub(crate) params: &'a [Vec<ParamSpec>],
    pub(crate) unit: usize,
    /// Offset of the `define-macro` element whose body is being built.
    pub(crate) macro_root: Option<usize>,
}

impl<'a> ProgramBuilder<'a> {
    pub(crate) fn new(
        registry: &'a MacroRegistry,
        params: &'a [Vec<ParamSpec>],
        unit: usize,
        macro_root: Option<usize>,
    ) -> Self {
        Self {
            registry,
            params,
            unit,
            macro_root,
        }
    }

    pub(crate) fn build_nodes(&self, nodes: &[Node]) -> Result<Block, TemplateError> {
        let mut block = Block::new();
        for node in nodes {
            match node {
                Node::Element(element) => {
                    for op in self.build_element(element)? {
                        push_op(&mut block, op);
                    }
                }
                other => {
                    let mut text = String::new();
                    other.write_source(&mut text);
                    push_op(&mut block, Operation::EmitLiteral(text));
                }
            }
        }
        Ok(block)
    }

    pub(crate) fn build_element(&self, element: &Element) -> Result<Block, TemplateError> {
        let commands = CommandSet::extract(element)?;
        let offset = element.location().offset;

        if commands.metal(MetalKind::DefineMacro).is_some() && self.macro_root != Some(offset) {
            return self.handle_define_macro_in_place(element);
        }
        if let Some(param) = commands.metal(MetalKind::DefineParam)
            && self.macro_root.is_none()
        {
            return Err(TemplateError::compile(
                "metal:define-param is only allowed inside metal:define-macro",
                Some(&param.location),
            ));
        }
        if let Some(slot) = commands.metal(MetalKind::DefineSlot) {
            let default = self.build_directives(element, &commands)?;
            return Ok(vec![self.handle_define_slot(slot, default)?]);
        }
        self.build_directives(element, &commands)
    }

    /// Builds an element once its macro-definition role has been settled.
    pub(crate) fn build_directives(
        &self,
        element: &Element,
        commands: &CommandSet,
    ) -> Result<Block, TemplateError> {
        if let Some(use_macro) = commands.metal(MetalKind::UseMacro) {
            let call = self.handle_use_macro(element, commands, use_macro)?;
            return self.wrap_tal(call, commands);
        }
        let core = self.handle_element_core(element, commands)?;
        self.wrap_tal(core, commands)
    }
}

/// Appends `op`, merging adjacent literals.
pub(crate) fn push_op(block: &mut Block, op: Operation) {
    if let Operation::EmitLiteral(text) = &op {
        if text.is_empty() {
            return;
        }
        if let Some(Operation::EmitLiteral(last)) = block.last_mut() {
            last.push_str(text);
            return;
        }
    }
    block.push(op);
}

pub(crate) fn extend_ops(block: &mut Block, ops: Block) {
    for op in ops {
        push_op(block, op);
    }
}
