//! Model provider adapters.
//!
//! Each provider implements the backend trait for its specific API.

mod anthropic;
mod openai;

pub use anthropic::{AnthropicBackend, AnthropicBackendBuilder};
pub use openai::{DEFAULT_MODEL, OpenAiBackend, OpenAiBackendBuilder};
