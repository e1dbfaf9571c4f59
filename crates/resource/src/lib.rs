//! Resource providers for talc template imports.
//!
//! - [`FilesystemResourceProvider`]: loads templates below a root directory
//!
//! The in-memory and layered providers live in talc-traits and are
//! re-exported here for convenience.

mod filesystem;

pub use filesystem::FilesystemResourceProvider;

pub use talc_traits::{InMemoryResourceProvider, LayeredResourceProvider};
