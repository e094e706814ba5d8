//! Tool-related types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Named arguments of a tool call.
pub type Arguments = Map<String, Value>;

/// Error type returned by tool bindings.
pub type BindingError = Box<dyn std::error::Error + Send + Sync>;

/// Executable body of a tool.
pub type Binding = Box<dyn Fn(&Arguments) -> Result<Value, BindingError> + Send + Sync>;

/// A tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub schema: Value,
}

impl ToolSpec {
    /// Required parameter names, in declared order.
    pub fn required(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// A tool call requested by the model.
///
/// `tool_name: null` is an explicit "no action" signal, optionally with a
/// `reason`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: Arguments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            arguments,
            reason: None,
        }
    }

    pub fn decline(reason: impl Into<String>) -> Self {
        Self {
            tool_name: None,
            arguments: Arguments::new(),
            reason: Some(reason.into()),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Arguments, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Arguments>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_in_declared_order() {
        let spec = ToolSpec {
            name: "move_to_position".into(),
            description: String::new(),
            schema: json!({"type": "object", "required": ["x", "y", "z"]}),
        };
        assert_eq!(spec.required(), vec!["x", "y", "z"]);

        let no_required = ToolSpec {
            schema: json!({"type": "object", "properties": {}}),
            ..spec
        };
        assert!(no_required.required().is_empty());
    }

    #[test]
    fn request_accepts_missing_or_null_arguments() {
        let call: ToolCallRequest = serde_json::from_value(json!({"tool_name": "hover"})).unwrap();
        assert_eq!(call.tool_name.as_deref(), Some("hover"));
        assert!(call.arguments.is_empty());

        let call: ToolCallRequest =
            serde_json::from_value(json!({"tool_name": null, "arguments": null, "reason": "done"}))
                .unwrap();
        assert_eq!(call, ToolCallRequest::decline("done"));
    }

    #[test]
    fn decline_serializes_wire_shape() {
        let value = serde_json::to_value(ToolCallRequest::decline("arrived")).unwrap();
        assert_eq!(value, json!({"tool_name": null, "arguments": {}, "reason": "arrived"}));
    }
}
