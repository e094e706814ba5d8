//! Tool definitions, validation and dispatch.

pub mod drone;
pub mod errors;
mod registry;
mod types;

pub use errors::ToolError;
pub use registry::ToolRegistry;
pub use types::{Arguments, Binding, BindingError, ToolCallRequest, ToolSpec};
