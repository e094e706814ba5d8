//! Structured results of one agent step.

use crate::tools::{Arguments, ToolCallRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name reported for steps that ran several tool calls.
pub const BATCH_TOOL_NAME: &str = "__batch__";

/// Category of a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    MissingRequiredParameters,
    ExecutionError,
    ModelError,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingRequiredParameters => "missing_required_parameters",
            Self::ExecutionError => "execution_error",
            Self::ModelError => "model_error",
        }
    }
}

/// A tool call that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub tool_name: String,
    pub arguments: Arguments,
    pub result: Value,
}

/// An image produced by a tool call, forwarded to the next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub camera: String,
    pub image_url: String,
}

/// The result of one agent step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The model called no tool: nothing parseable, or an explicit decline.
    NoAction {
        reason: String,
        plan: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
        llm_response: String,
    },
    /// A multi-call list contained an entry without a tool name.
    Rejected {
        reason: String,
        plan: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
        llm_response: String,
    },
    /// A call failed validation; nothing was executed.
    Invalid {
        tool_name: String,
        arguments: Arguments,
        error: String,
        plan: Option<String>,
    },
    /// A single call executed successfully.
    Executed {
        call: CallRecord,
        plan: Option<String>,
    },
    /// Several calls executed successfully, in order.
    Batch {
        tool_calls: Vec<ToolCallRequest>,
        results: Vec<CallRecord>,
        plan: Option<String>,
    },
    /// A call failed during execution; `results` holds the calls before it.
    Failed {
        tool_name: String,
        arguments: Arguments,
        error: String,
        tool_calls: Vec<ToolCallRequest>,
        results: Vec<CallRecord>,
        plan: Option<String>,
    },
    /// The model request itself failed.
    ModelFailed { error: String },
}

impl StepOutcome {
    /// Tool name of the step: the single tool, [`BATCH_TOOL_NAME`], or none.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::NoAction { .. } | Self::Rejected { .. } | Self::ModelFailed { .. } => None,
            Self::Invalid { tool_name, .. } | Self::Failed { tool_name, .. } => Some(tool_name),
            Self::Executed { call, .. } => Some(&call.tool_name),
            Self::Batch { .. } => Some(BATCH_TOOL_NAME),
        }
    }

    pub fn success(&self) -> bool {
        matches!(
            self,
            Self::NoAction { .. } | Self::Executed { .. } | Self::Batch { .. }
        )
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            Self::Invalid { error, .. }
            | Self::Failed { error, .. }
            | Self::ModelFailed { error } => Some(error),
            _ => None,
        }
    }

    pub fn error_type(&self) -> Option<ErrorType> {
        match self {
            Self::Invalid { .. } => Some(ErrorType::MissingRequiredParameters),
            Self::Failed { .. } => Some(ErrorType::ExecutionError),
            Self::ModelFailed { .. } => Some(ErrorType::ModelError),
            _ => None,
        }
    }

    /// Why no tool was called.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::NoAction { reason, .. } | Self::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn plan(&self) -> Option<&str> {
        match self {
            Self::NoAction { plan, .. }
            | Self::Rejected { plan, .. }
            | Self::Invalid { plan, .. }
            | Self::Executed { plan, .. }
            | Self::Batch { plan, .. }
            | Self::Failed { plan, .. } => plan.as_deref(),
            Self::ModelFailed { .. } => None,
        }
    }

    /// Arguments of the single call this outcome refers to.
    pub fn arguments(&self) -> Option<&Arguments> {
        match self {
            Self::Invalid { arguments, .. } | Self::Failed { arguments, .. } => Some(arguments),
            Self::Executed { call, .. } => Some(&call.arguments),
            _ => None,
        }
    }

    /// Result of a single executed call.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Executed { call, .. } => Some(&call.result),
            _ => None,
        }
    }

    /// Completed calls, in execution order.
    pub fn results(&self) -> &[CallRecord] {
        match self {
            Self::Executed { call, .. } => std::slice::from_ref(call),
            Self::Batch { results, .. } | Self::Failed { results, .. } => results,
            _ => &[],
        }
    }

    /// Tool calls the model requested in this step.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::NoAction { tool_calls, .. }
            | Self::Rejected { tool_calls, .. }
            | Self::Batch { tool_calls, .. }
            | Self::Failed { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Images returned by successful calls of this step.
    pub fn produced_images(&self) -> Vec<ImageAttachment> {
        if !self.success() {
            return Vec::new();
        }
        self.results()
            .iter()
            .filter_map(|record| {
                let image_url = record.result.get("image_url")?.as_str()?;
                let camera = record
                    .result
                    .get("camera")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                Some(ImageAttachment {
                    camera: camera.to_string(),
                    image_url: image_url.to_string(),
                })
            })
            .collect()
    }
}
