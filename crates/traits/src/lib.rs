pub mod resource;

pub use resource::{
    InMemoryResourceProvider, LayeredResourceProvider, ResourceError, ResourceProvider,
    SharedResourceData,
};
