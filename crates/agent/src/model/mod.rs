//! Vision-model protocol types and backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{Backend, GenerateRequest, Generation, ImageRef, Message, Part, Role, Usage};
