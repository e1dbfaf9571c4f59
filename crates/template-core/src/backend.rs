//! Contracts between the compiler, code-emission backends and callers.

use crate::error::{RenderError, TemplateError};
use crate::key::TemplateKey;
use crate::program::Program;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use talc_tales::Value;

/// A program with the inputs its key was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub key: TemplateKey,
    pub program: Program,
    pub generator_version: String,
    pub global_types: BTreeMap<String, String>,
    pub dependencies: BTreeSet<String>,
}

/// Converts values to text for escaped or structural output.
pub trait ValueFormatter: Send + Sync {
    fn format(&self, value: &Value) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormatter;

impl ValueFormatter for DefaultFormatter {
    fn format(&self, value: &Value) -> String {
        value.to_text()
    }
}

/// An executable rendering of one program.
pub trait RenderProcedure: Send + Sync + fmt::Debug {
    fn render(
        &self,
        out: &mut dyn fmt::Write,
        globals: &HashMap<String, Value>,
        formatter: &dyn ValueFormatter,
    ) -> Result<(), RenderError>;
}

/// Turns a portable program into a [`RenderProcedure`].
///
/// Rejections are reported as [`TemplateError::Compile`].
pub trait CodeBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn compile(&self, program: &CompiledProgram) -> Result<Arc<dyn RenderProcedure>, TemplateError>;
}

/// A compiled program paired with its render procedure.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    program: Arc<CompiledProgram>,
    procedure: Arc<dyn RenderProcedure>,
}

impl CompiledTemplate {
    pub fn new(program: Arc<CompiledProgram>, procedure: Arc<dyn RenderProcedure>) -> Self {
        Self { program, procedure }
    }

    pub fn program(&self) -> &CompiledProgram {
        &self.program
    }

    pub fn key(&self) -> &TemplateKey {
        &self.program.key
    }

    pub fn render(&self, globals: &HashMap<String, Value>) -> Result<String, RenderError> {
        self.render_with(globals, &DefaultFormatter)
    }

    pub fn render_with(
        &self,
        globals: &HashMap<String, Value>,
        formatter: &dyn ValueFormatter,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        self.procedure.render(&mut out, globals, formatter)?;
        Ok(out)
    }

    pub fn render_into(
        &self,
        out: &mut dyn fmt::Write,
        globals: &HashMap<String, Value>,
        formatter: &dyn ValueFormatter,
    ) -> Result<(), RenderError> {
        self.procedure.render(out, globals, formatter)
    }
}
