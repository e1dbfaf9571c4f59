//! Handlers for each [`Operation`](talc_template_core::Operation) kind,
//! split by concern.

pub(crate) mod control_flow;
pub(crate) mod literals;
pub(crate) mod macros;
pub(crate) mod variables;
