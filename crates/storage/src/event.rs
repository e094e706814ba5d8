//! Event types for the flight log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A unique identifier for an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// The role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// The kind of event that occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// An agent run started.
    SessionStart { task: String },
    /// An agent run ended after `steps` steps.
    SessionEnd { steps: usize },
    /// A message was added to the conversation.
    Message { role: Role, content: String },
    /// The plan the model wrote before its tool calls.
    Plan { text: String },
    /// A tool was invoked.
    ToolCall { name: String, input: Value },
    /// A tool returned, or failed with the error text as `output`.
    ToolResult {
        name: String,
        output: Value,
        success: bool,
    },
    /// Vehicle status sent to the model.
    Status { snapshot: Value },
}

impl EventKind {
    /// Every kind name, as stored in the `kind` column.
    pub const NAMES: [&'static str; 7] = [
        "session_start",
        "session_end",
        "message",
        "plan",
        "tool_call",
        "tool_result",
        "status",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SessionStart { .. } => "session_start",
            EventKind::SessionEnd { .. } => "session_end",
            EventKind::Message { .. } => "message",
            EventKind::Plan { .. } => "plan",
            EventKind::ToolCall { .. } => "tool_call",
            EventKind::ToolResult { .. } => "tool_result",
            EventKind::Status { .. } => "status",
        }
    }
}

/// An event in the flight log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(session_id: SessionId, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn message(session_id: SessionId, role: Role, content: impl Into<String>) -> Self {
        Self::new(
            session_id,
            EventKind::Message {
                role,
                content: content.into(),
            },
        )
    }

    pub fn tool_call(session_id: SessionId, name: impl Into<String>, input: Value) -> Self {
        Self::new(
            session_id,
            EventKind::ToolCall {
                name: name.into(),
                input,
            },
        )
    }

    pub fn tool_result(
        session_id: SessionId,
        name: impl Into<String>,
        output: Value,
        success: bool,
    ) -> Self {
        Self::new(
            session_id,
            EventKind::ToolResult {
                name: name.into(),
                output,
                success,
            },
        )
    }
}
