//! Render-time variable scopes.

use crate::error::EvalError;
use crate::value::Value;
use std::collections::HashMap;

/// A chain of frames; the first frame holds globals.
///
/// Lookups search innermost-first. `define` writes the innermost frame,
/// `define global` the root frame, and `set` rebinds the nearest frame that
/// already defines the name.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<HashMap<String, Value>>,
}

impl Default for Scope {
    fn default() -> Self {
        Scope {
            frames: vec![HashMap::new()],
        }
    }
}

impl Scope {
    pub fn new<I, K>(globals: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Scope {
            frames: vec![globals.into_iter().map(|(k, v)| (k.into(), v)).collect()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pops the innermost frame; the root frame is never removed.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drops frames until at most `depth` remain.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn define_local(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    pub fn define_global(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.first_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Rebinds `name` in the nearest frame that defines it.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        let frame = self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.contains_key(name))
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))?;
        frame.insert(name.to_string(), value);
        Ok(())
    }
}
