pub(super) mod metal;
pub(super) mod tal;

use crate::arguments::{compile_expr, parse_attributes, parse_content, parse_omit};
use crate::command::{CommandSet, TalKind, is_directive_element, is_stripped_attribute};
use crate::compiler::{ProgramBuilder, extend_ops, push_op};
use talc_markup::{Element, Location};
use talc_template_core::{
    AttributeRewrite, Block, Expr, Omit, Operation, StaticAttribute, TagOp, TemplateError,
};

// Handlers for the element itself: tags, content and replace.
// Scoping and control-flow wrappers live in `tal`, macros in `metal`.

impl ProgramBuilder<'_> {
    /// The element with its content, before define/condition/repeat/on-error.
    pub(crate) fn handle_element_core(
        &self,
        element: &Element,
        commands: &CommandSet,
    ) -> Result<Block, TemplateError> {
        let stripped = element
            .start
            .attributes
            .iter()
            .any(|a| is_stripped_attribute(element, a));

        if commands.is_empty() && !stripped && !is_directive_element(element) {
            let mut block = Block::new();
            push_op(&mut block, Operation::EmitLiteral(element.start.text.clone()));
            extend_ops(&mut block, self.build_nodes(&element.children)?);
            if let Some(end) = &element.end {
                push_op(&mut block, Operation::EmitLiteral(end.text.clone()));
            }
            return Ok(block);
        }

        let children = self.build_nodes(&element.children)?;
        let content = commands
            .tal(TalKind::Content)
            .or(commands.tal(TalKind::Replace));
        let tag = self.tag_op(element, commands, content.is_some())?;

        match content {
            None => Ok(wrap_tag(tag, children)),
            Some(command) => {
                let (structure, expr) = parse_content(&command.argument, &command.location)?;
                if command.kind == TalKind::Replace {
                    Ok(vec![Operation::EmitExpression {
                        expr,
                        structure,
                        default: wrap_tag(tag, children),
                    }])
                } else {
                    let body = vec![Operation::EmitExpression {
                        expr,
                        structure,
                        default: children,
                    }];
                    Ok(wrap_tag(tag, body))
                }
            }
        }
    }

    fn tag_op(
        &self,
        element: &Element,
        commands: &CommandSet,
        has_content: bool,
    ) -> Result<TagOp, TemplateError> {
        let attributes = element
            .start
            .attributes
            .iter()
            .filter(|a| !is_stripped_attribute(element, a))
            .map(|a| StaticAttribute {
                name: a.raw_name.clone(),
                leading: a.leading.clone(),
                equals: a.equals.clone(),
                value: a.value.clone(),
                quote: a.quote,
            })
            .collect();

        let rewrites = match commands.tal(TalKind::Attributes) {
            Some(command) => parse_attributes(&command.argument, &command.location)?
                .into_iter()
                .map(|entry| AttributeRewrite {
                    name: entry.name,
                    expr: entry.expr,
                })
                .collect(),
            None => Vec::new(),
        };

        let omit = if is_directive_element(element) {
            Omit::Always
        } else {
            match commands.tal(TalKind::OmitTag) {
                Some(command) => parse_omit(&command.argument, &command.location)?,
                None => Omit::Never,
            }
        };

        let (close, end) = if element.start.self_closing && has_content {
            (">".to_string(), Some(format!("</{}>", element.start.raw_name)))
        } else {
            (
                element.start.close.clone(),
                element.end.as_ref().map(|e| e.text.clone()),
            )
        };

        Ok(TagOp {
            name: element.start.raw_name.clone(),
            attributes,
            rewrites,
            close,
            end,
            omit,
        })
    }
}

/// Surrounds `body` with the tag, as literals when nothing is decided at
/// render time.
fn wrap_tag(tag: TagOp, body: Block) -> Block {
    let mut block = Block::new();
    match tag.omit {
        Omit::Always => extend_ops(&mut block, body),
        Omit::Never if tag.rewrites.is_empty() => {
            push_op(&mut block, Operation::EmitLiteral(static_start(&tag)));
            extend_ops(&mut block, body);
            if let Some(end) = &tag.end {
                push_op(&mut block, Operation::EmitLiteral(end.clone()));
            }
        }
        _ => block.push(Operation::Element { tag, body }),
    }
    block
}

fn static_start(tag: &TagOp) -> String {
    let mut out = format!("<{}", tag.name);
    for attribute in &tag.attributes {
        attribute.write_to(&mut out);
    }
    out.push_str(&tag.close);
    out
}

/// Parses an `[text|structure] EXPR` handler argument.
pub(crate) fn handler_expr(argument: &str, location: &Location) -> Result<(bool, Expr), TemplateError> {
    if argument.trim().is_empty() {
        return Ok((false, compile_expr("nothing", location)?));
    }
    parse_content(argument, location)
}
