//! Handlers for `metal:define-macro`, `metal:use-macro`, slots and parameters.

use crate::arguments::{compile_expr, parse_fill_param};
use crate::command::{Command, CommandSet, MetalKind, TalKind};
use crate::compiler::ProgramBuilder;
use talc_markup::{Element, Location, Node};
use talc_template_core::{Block, MacroTarget, Operation, ParamFill, SlotFill, TemplateError};

impl ProgramBuilder<'_> {
    /// A macro definition met outside its own body renders where it stands.
    pub(crate) fn handle_define_macro_in_place(
        &self,
        element: &Element,
    ) -> Result<Block, TemplateError> {
        let location = element.location();
        let id = self
            .registry
            .definition_at(self.unit, location.offset)
            .ok_or_else(|| {
                TemplateError::macro_resolution("macro definition was not registered", location)
            })?;
        Ok(vec![Operation::CallMacro {
            target: MacroTarget::Static(id),
            fills: Vec::new(),
            params: Vec::new(),
            location: location.clone(),
        }])
    }

    pub(crate) fn handle_define_slot(
        &self,
        slot: &Command<MetalKind>,
        default: Block,
    ) -> Result<Operation, TemplateError> {
        let name = slot.argument.trim();
        if name.is_empty() {
            return Err(TemplateError::compile(
                "metal:define-slot requires a name",
                Some(&slot.location),
            ));
        }
        Ok(Operation::DefineSlot {
            name: name.to_string(),
            default,
        })
    }

    pub(crate) fn handle_use_macro(
        &self,
        element: &Element,
        commands: &CommandSet,
        use_macro: &Command<MetalKind>,
    ) -> Result<Block, TemplateError> {
        let location = &use_macro.location;
        let expr = compile_expr(&use_macro.argument, location)?;
        let target = match self
            .registry
            .resolve_static(self.unit, &expr.expression, location)?
        {
            Some(id) => MacroTarget::Static(id),
            None => MacroTarget::Dynamic(expr),
        };

        for ignored in [
            TalKind::Content,
            TalKind::Replace,
            TalKind::Attributes,
            TalKind::OmitTag,
        ] {
            if commands.tal(ignored).is_some() {
                log::debug!(
                    "{} has no effect on a metal:use-macro element at {}",
                    ignored.attribute_name(),
                    location
                );
            }
        }

        let mut params = Vec::new();
        if let Some(fill) = commands.metal(MetalKind::FillParam) {
            params.extend(parse_fill_param(&fill.argument, &fill.location)?);
        }
        let mut fills = Vec::new();
        self.collect_fills(&element.children, &mut fills, &mut params)?;

        if let MacroTarget::Static(id) = &target {
            self.check_params(*id, &params, location)?;
        }

        Ok(vec![Operation::CallMacro {
            target,
            fills,
            params,
            location: location.clone(),
        }])
    }

    /// Gathers `fill-slot` and `fill-param` elements below a `use-macro`.
    ///
    /// The first fill for a slot name wins. Fill elements and nested
    /// `use-macro` elements are not searched.
    fn collect_fills(
        &self,
        nodes: &[Node],
        fills: &mut Vec<SlotFill>,
        params: &mut Vec<ParamFill>,
    ) -> Result<(), TemplateError> {
        for node in nodes {
            let Node::Element(element) = node else {
                continue;
            };
            let commands = CommandSet::extract(element)?;
            if let Some(fill) = commands.metal(MetalKind::FillParam) {
                params.extend(parse_fill_param(&fill.argument, &fill.location)?);
            }
            if let Some(slot) = commands.metal(MetalKind::FillSlot) {
                let name = slot.argument.trim();
                if fills.iter().any(|f| f.name == name) {
                    log::debug!("Ignoring second fill for slot '{}' at {}", name, slot.location);
                } else {
                    fills.push(SlotFill {
                        name: name.to_string(),
                        body: self.build_element(element)?,
                    });
                }
                continue;
            }
            if commands.metal(MetalKind::UseMacro).is_some() {
                continue;
            }
            self.collect_fills(&element.children, fills, params)?;
        }
        Ok(())
    }

    fn check_params(
        &self,
        id: usize,
        params: &[ParamFill],
        location: &Location,
    ) -> Result<(), TemplateError> {
        let declared = self.params.get(id).map(Vec::as_slice).unwrap_or(&[]);
        let name = self
            .registry
            .definitions()
            .get(id)
            .map(|d| d.name.as_str())
            .unwrap_or_default();
        for param in params {
            if !declared.iter().any(|p| p.name == param.name) {
                return Err(TemplateError::macro_resolution(
                    format!("macro '{}' has no parameter '{}'", name, param.name),
                    location,
                ));
            }
        }
        Ok(())
    }
}
