//! Drone agent: a vision-model control loop for a multirotor.
//!
//! Each step sends the model the system prompt, the vehicle status, an
//! instruction and camera images, parses the plan and tool calls out of the
//! reply, validates every call and then executes them in order against the
//! flight API.
//!
//! # Overview
//!
//! - **Agent**: owns the backend, the drone handle and the tool registry.
//!   [`Agent::step`] is one round-trip, [`Agent::chat`] loops until the model
//!   stops calling tools or something fails.
//! - **Backend**: a trait over vision-model providers (OpenAI-compatible and
//!   Anthropic adapters are included).
//! - **ToolRegistry**: named tools with JSON schemas and bindings.
//! - **Observer**: optional progress notifications for UIs and flight logs.
//!
//! # Example
//!
//! ```ignore
//! use agent::{Agent, OpenAiBackend};
//! use sim::KinematicSim;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let backend = OpenAiBackend::builder("sk-...").build();
//! let agent = Agent::new(backend, Arc::new(KinematicSim::new()));
//!
//! for outcome in agent.chat("Take off and climb to 10 m", 10).await {
//!     println!("{:?} success={}", outcome.tool_name(), outcome.success());
//! }
//! # }
//! ```

mod agent;
mod conversation;
mod error;
pub mod logging;
pub mod model;
mod observer;
mod outcome;
mod parser;
pub mod prompt;
mod providers;
pub mod tools;

#[cfg(test)]
mod testing;

pub use agent::{Agent, DEFAULT_MAX_TOKENS};

// Errors
pub use error::{Error, Result};

// Model protocol and providers
pub use model::{Backend, Generation, Message, ModelError};
pub use providers::{
    AnthropicBackend, AnthropicBackendBuilder, DEFAULT_MODEL, OpenAiBackend, OpenAiBackendBuilder,
};

// Step results
pub use outcome::{BATCH_TOOL_NAME, CallRecord, ErrorType, ImageAttachment, StepOutcome};
pub use parser::{ParsedResponse, parse_response};

// Progress notifications
pub use observer::{LlmOutput, Observer, StatusSnapshot, ToolCallReport, TracingObserver};

pub use logging::{LoggingConfig, LoggingContext, log_data};
pub use tools::{ToolCallRequest, ToolError, ToolRegistry};
