//! Extraction of plan text and tool calls from free-form model replies.
//!
//! Replies are expected to be a short plan followed by a JSON array of
//! `{"tool_name": ..., "arguments": {...}}` objects, but models also send a
//! bare object, bare JSON, or prose only. Nothing here fails: malformed JSON
//! yields an empty call list.

use crate::tools::ToolCallRequest;
use serde_json::Value;

const TOOL_NAME_KEY: &str = "\"tool_name\"";

/// Plan text and tool calls found in a model reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedResponse {
    pub plan: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Splits a model reply into plan text and tool calls.
///
/// The whole reply is tried as JSON first. Otherwise the first embedded
/// array whose first object mentions `"tool_name"` is used, then the first
/// embedded object that does. The plan is the trimmed text before the
/// matched span, or the whole reply when nothing matched.
pub fn parse_response(text: &str) -> ParsedResponse {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        if let Some(tool_calls) = whole_reply_calls(value) {
            return ParsedResponse {
                plan: None,
                tool_calls,
            };
        }
    }

    let (plan, tool_calls) = match find_array(text).or_else(|| find_object(text)) {
        Some((start, end)) => (&text[..start], calls_from_str(&text[start..end])),
        None => (text, Vec::new()),
    };
    let plan = plan.trim();

    ParsedResponse {
        plan: (!plan.is_empty()).then(|| plan.to_string()),
        tool_calls,
    }
}

/// Calls from a reply that is a JSON value on its own, if it has the call shape.
fn whole_reply_calls(value: Value) -> Option<Vec<ToolCallRequest>> {
    match value {
        Value::Object(_) if is_call(&value) => Some(to_calls(vec![value])),
        Value::Array(items) if items.iter().all(is_call) => Some(to_calls(items)),
        _ => None,
    }
}

fn calls_from_str(span: &str) -> Vec<ToolCallRequest> {
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Array(items)) if items.iter().all(is_call) => to_calls(items),
        Ok(value @ Value::Object(_)) if is_call(&value) => to_calls(vec![value]),
        _ => Vec::new(),
    }
}

fn is_call(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| obj.contains_key("tool_name"))
}

/// Converts call objects, dropping the whole list if any is ill-typed.
fn to_calls(items: Vec<Value>) -> Vec<ToolCallRequest> {
    items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<ToolCallRequest>, _>>()
        .unwrap_or_default()
}

/// First `[ {` span whose leading object mentions `"tool_name"`.
///
/// An array that never closes, e.g. a reply cut off at the token limit,
/// still matches and runs to the end of the text, so it fails to parse as a
/// whole instead of yielding the calls that happen to be complete.
fn find_array(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    positions(bytes, b'[').find_map(|start| {
        let open = start + 1 + leading_whitespace(&bytes[start + 1..]);
        if bytes.get(open) != Some(&b'{') {
            return None;
        }
        let first_end = balanced_end(bytes, open).unwrap_or(bytes.len());
        if !text[open..first_end].contains(TOOL_NAME_KEY) {
            return None;
        }
        let end = balanced_end(bytes, start).unwrap_or(bytes.len());
        Some((start, end))
    })
}

/// First balanced `{...}` span that mentions `"tool_name"`.
fn find_object(text: &str) -> Option<(usize, usize)> {
    positions(text.as_bytes(), b'{').find_map(|start| {
        let end = balanced_end(text.as_bytes(), start)?;
        text[start..end]
            .contains(TOOL_NAME_KEY)
            .then_some((start, end))
    })
}

fn positions(bytes: &[u8], needle: u8) -> impl Iterator<Item = usize> + '_ {
    bytes
        .iter()
        .enumerate()
        .filter(move |(_, b)| **b == needle)
        .map(|(i, _)| i)
}

fn leading_whitespace(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_whitespace()).count()
}

/// End (exclusive) of the bracketed value opening at `start`.
///
/// Brackets inside JSON strings are skipped. Returns `None` for mismatched
/// or unterminated brackets.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => stack.push(b']'),
            b'{' => stack.push(b'}'),
            b']' | b'}' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        match arguments {
            Value::Object(map) => ToolCallRequest::new(name, map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn bare_object_has_no_plan() {
        let parsed = parse_response(r#"{"tool_name": "takeoff", "arguments": {"timeout_sec": 5}}"#);
        assert_eq!(parsed.plan, None);
        assert_eq!(parsed.tool_calls, vec![call("takeoff", json!({"timeout_sec": 5}))]);
    }

    #[test]
    fn bare_array_has_no_plan() {
        let parsed = parse_response(
            r#"  [{"tool_name": "arm", "arguments": {"armed": true}}, {"tool_name": "takeoff"}]  "#,
        );
        assert_eq!(parsed.plan, None);
        assert_eq!(parsed.tool_calls.len(), 2);
        assert_eq!(parsed.tool_calls[1].tool_name.as_deref(), Some("takeoff"));
        assert!(parsed.tool_calls[1].arguments.is_empty());
    }

    #[test]
    fn plan_prefix_and_array() {
        let parsed = parse_response("规划：起飞\n[{\"tool_name\":\"takeoff\",\"arguments\":{}}]");
        assert_eq!(parsed.plan.as_deref(), Some("规划：起飞"));
        assert_eq!(parsed.tool_calls, vec![call("takeoff", json!({}))]);
    }

    #[test]
    fn plan_with_multi_call_array_keeps_order() {
        let text = r#"Plan:
- arm
- take off
- climb
Tool calls:
[
  {"tool_name": "arm", "arguments": {"armed": true}},
  {"tool_name": "takeoff", "arguments": {}},
  {"tool_name": "move_to_z", "arguments": {"z": -10}}
]
"#;
        let parsed = parse_response(text);
        assert_eq!(
            parsed.plan.as_deref(),
            Some("Plan:\n- arm\n- take off\n- climb\nTool calls:")
        );
        let names: Vec<_> = parsed
            .tool_calls
            .iter()
            .map(|c| c.tool_name.as_deref().unwrap())
            .collect();
        assert_eq!(names, ["arm", "takeoff", "move_to_z"]);
    }

    #[test]
    fn explicit_decline() {
        let parsed = parse_response(r#"{"tool_name": null, "reason": "已到达目标"}"#);
        assert_eq!(parsed.plan, None);
        assert_eq!(parsed.tool_calls, vec![ToolCallRequest::decline("已到达目标")]);
    }

    #[test]
    fn embedded_object_with_nested_arguments() {
        let parsed = parse_response(
            r#"Climb first. {"tool_name": "move_to_position", "arguments": {"x": 1, "y": 2, "z": -5}} done"#,
        );
        assert_eq!(parsed.plan.as_deref(), Some("Climb first."));
        assert_eq!(
            parsed.tool_calls,
            vec![call("move_to_position", json!({"x": 1, "y": 2, "z": -5}))]
        );
    }

    #[test]
    fn array_takes_precedence_over_earlier_object() {
        let text = r#"Note {"tool_name": "hover"} then [{"tool_name": "land"}]"#;
        let parsed = parse_response(text);
        assert_eq!(parsed.plan.as_deref(), Some(r#"Note {"tool_name": "hover"} then"#));
        assert_eq!(parsed.tool_calls[0].tool_name.as_deref(), Some("land"));
    }

    #[test]
    fn nested_path_array_is_not_mistaken_for_call_list() {
        let text = r#"Follow the path.
[{"tool_name": "move_on_path", "arguments": {"path": [[0, 0, -3], [10, 0, -3]]}}]"#;
        let parsed = parse_response(text);
        assert_eq!(parsed.plan.as_deref(), Some("Follow the path."));
        assert_eq!(parsed.tool_calls[0].arguments["path"], json!([[0, 0, -3], [10, 0, -3]]));
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let text = r#"Plan [x]: [{"tool_name": "hover", "reason": "wait } for ] wind"}]"#;
        let parsed = parse_response(text);
        assert_eq!(parsed.plan.as_deref(), Some("Plan [x]:"));
        assert_eq!(parsed.tool_calls[0].reason.as_deref(), Some("wait } for ] wind"));
    }

    #[test]
    fn malformed_json_yields_no_calls() {
        let parsed = parse_response(r#"Plan: go [{"tool_name": "takeoff", "arguments": {,}}]"#);
        assert_eq!(parsed.plan.as_deref(), Some("Plan: go"));
        assert!(parsed.tool_calls.is_empty());

        let parsed = parse_response(r#"Plan: go {"tool_name": "takeoff", "arguments": {"#);
        assert!(parsed.tool_calls.is_empty());
    }

    #[test]
    fn truncated_array_yields_no_calls() {
        let cut_mid_call = "Plan: arm, take off\n[{\"tool_name\": \"arm\", \"arguments\": {\"armed\": true}}, {\"tool_name\": \"takeoff\", \"argu";
        let parsed = parse_response(cut_mid_call);
        assert_eq!(parsed.plan.as_deref(), Some("Plan: arm, take off"));
        assert!(parsed.tool_calls.is_empty());

        let missing_bracket = r#"Plan: arm, take off
[{"tool_name": "arm", "arguments": {"armed": true}}, {"tool_name": "takeoff", "arguments": {}}"#;
        let parsed = parse_response(missing_bracket);
        assert_eq!(parsed.plan.as_deref(), Some("Plan: arm, take off"));
        assert!(parsed.tool_calls.is_empty());

        let cut_in_first_call = r#"Arm. [{"tool_name": "arm", "arguments": {"arm"#;
        let parsed = parse_response(cut_in_first_call);
        assert_eq!(parsed.plan.as_deref(), Some("Arm."));
        assert!(parsed.tool_calls.is_empty());
    }

    #[test]
    fn ill_typed_call_yields_no_calls() {
        let parsed = parse_response(r#"[{"tool_name": 7}]"#);
        assert!(parsed.tool_calls.is_empty());
    }

    #[test]
    fn prose_only_becomes_plan() {
        let parsed = parse_response("  I cannot see the target yet.  ");
        assert_eq!(parsed.plan.as_deref(), Some("I cannot see the target yet."));
        assert!(parsed.tool_calls.is_empty());

        assert_eq!(parse_response("   "), ParsedResponse::default());
    }

    #[test]
    fn json_without_call_shape_falls_through() {
        let parsed = parse_response(r#"{"answer": 42}"#);
        assert_eq!(parsed.plan.as_deref(), Some(r#"{"answer": 42}"#));
        assert!(parsed.tool_calls.is_empty());
    }
}
