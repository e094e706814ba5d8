use super::types::BindingError;
use thiserror::Error;

/// Errors that can occur when validating or executing a tool call.
///
/// Binding failures of any kind surface as [`ToolError::Execution`] with the
/// original error kept as the source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing required parameters: {}", missing.join(", "))]
    MissingParameters { tool: String, missing: Vec<String> },

    #[error("tool {tool} failed: {source}")]
    Execution {
        tool: String,
        #[source]
        source: BindingError,
    },
}

impl ToolError {
    /// Name of the tool the error refers to.
    pub fn tool(&self) -> &str {
        match self {
            Self::UnknownTool(tool) => tool,
            Self::MissingParameters { tool, .. } | Self::Execution { tool, .. } => tool,
        }
    }
}
