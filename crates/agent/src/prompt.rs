//! Model-facing text: system prompt, status block and follow-up prompts.

use crate::outcome::{BATCH_TOOL_NAME, StepOutcome};
use serde_json::Value;
use sim::{DroneCamera, MultirotorState};

/// Sent instead of the status block when the vehicle state cannot be read.
pub const STATUS_UNAVAILABLE: &str = "Warning: the current drone status is unavailable.";

/// Stands in for embedded image data in prompt text.
const IMAGE_PLACEHOLDER: &str = "<image attached>";

/// Builds the system prompt from the tool summary and the mounted cameras.
///
/// The first camera is the one whose view is attached by default.
pub fn system_prompt(tool_summary: &str, cameras: &[DroneCamera]) -> String {
    let camera_lines = cameras
        .iter()
        .enumerate()
        .map(|(i, camera)| {
            let access = if i == 0 {
                "provided by default"
            } else {
                "available through get_camera_image"
            };
            format!("- {} ({}): {access}", camera.name(), camera.placement())
        })
        .collect::<Vec<_>>()
        .join("\n");
    let default_camera = cameras.first().map_or("FRONT_CENTER", |c| c.name());

    format!(
        r#"You are a drone control agent. You make decisions and fly the drone from visual information only.

Available tools:
{tool_summary}

Cameras:
The drone carries {count} cameras:
{camera_lines}

By default you only see the {default_camera} image. To look in another direction (for example to check for obstacles behind or below), call get_camera_image with the camera you need.

Tool call format:
First write a short plan, then the list of tool calls as JSON:
Plan:
<short bullet points of what you will do next, no detailed reasoning>
Tool calls:
[
  {{
    "tool_name": "tool_name_1",
    "arguments": {{"param": "value"}}
  }},
  {{
    "tool_name": "tool_name_2",
    "arguments": {{"param": "value"}}
  }}
]

If no tool should be called, return {{"tool_name": null, "reason": "why"}}.

Parameter rules:
- Each tool lists its required parameters.
- You must give a value for every required parameter; never omit one or set it to null.
- Optional parameters may be omitted and then take their default values.
- Example: move_to_position requires x, y and z, so every call must provide all three.

Operating rules:
1. By default you only have the {default_camera} image; there is no IMU, GPS or barometer data.
2. Use get_camera_image when you need another view.
3. Judge the environment, obstacles and targets from the images.
4. Coordinates are NED: X = north, Y = east, Z = down, so negative Z is up.
5. Distances are in metres and speeds in metres per second.
6. Yaw angles are in degrees and angular rates in radians per second.
7. Infer the drone state (on the ground, height, surroundings) from the images.
8. Fly safely: check the ground before takeoff and the landing area before landing.
9. Navigate by visual landmarks such as buildings.
10. Arm before any flight action and disarm when the task is finished.
"#,
        count = cameras.len(),
    )
}

/// Formats position, velocity and attitude for the model.
pub fn status_text(state: &MultirotorState) -> String {
    let k = &state.kinematics;
    let (p, v, q) = (k.position, k.linear_velocity, k.orientation);
    format!(
        "Current drone status:

Position (NED, metres):
  - X (north): {:.2}
  - Y (east): {:.2}
  - Z (down): {:.2} (altitude: {:.2} m)

Velocity (NED, m/s):
  - X (north): {:.2}
  - Y (east): {:.2}
  - Z (down): {:.2}

Orientation (quaternion):
  - w: {:.4}
  - x: {:.4}
  - y: {:.4}
  - z: {:.4}
",
        p.x,
        p.y,
        p.z,
        p.altitude(),
        v.x,
        v.y,
        v.z,
        q.w,
        q.x,
        q.y,
        q.z,
    )
}

/// Caption for live camera views attached to a request.
pub fn observation_caption(cameras: &[DroneCamera]) -> String {
    match cameras {
        [camera] => format!(
            "Live image from the {} camera:\n\nBase your decision on this image.",
            camera.name()
        ),
        _ => {
            let names: Vec<&str> = cameras.iter().map(|c| c.name()).collect();
            format!(
                "Live images from {} cameras ({}):\n\nBase your decision on these images.",
                cameras.len(),
                names.join(", ")
            )
        }
    }
}

/// Caption for an image carried over from the previous step.
pub fn image_caption(camera: &str) -> String {
    format!("Image from the {camera} camera:")
}

/// Instruction for the step following `outcome`.
pub fn continuation_prompt(outcome: &StepOutcome) -> String {
    let tool_name = outcome.tool_name().unwrap_or("none");

    if tool_name == BATCH_TOOL_NAME {
        let results = outcome.results();
        let json = pretty(&serde_json::to_value(results).unwrap_or(Value::Null));
        return format!(
            "Executed {} tool calls in order. Results: {json}. Continue with the task or state that it is complete.",
            results.len()
        );
    }

    match outcome.result() {
        Some(result) if result.get("image_url").is_some() => {
            let camera = result
                .get("camera")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            format!(
                "Tool {tool_name} finished and captured an image from the {camera} camera \
                 ({}px wide, {}px high). Analyse this image or continue with the task.",
                result.get("width").unwrap_or(&Value::Null),
                result.get("height").unwrap_or(&Value::Null),
            )
        }
        Some(result) => format!(
            "Tool {tool_name} finished. Result: {}. Continue with the task or state that it is complete.",
            pretty(result)
        ),
        None => format!("Tool {tool_name} finished. Continue with the task or state that it is complete."),
    }
}

/// Closing message after a conversation.
pub fn final_response(steps: usize, last: &StepOutcome) -> String {
    let mut text = format!("Task finished after {steps} step(s).");
    if !last.success() {
        text.push_str(&format!(
            " The last step failed: {}",
            last.error().unwrap_or("unknown error")
        ));
    }
    text
}

fn pretty(value: &Value) -> String {
    let redacted = redact_images(value);
    serde_json::to_string_pretty(&redacted).unwrap_or_else(|_| redacted.to_string())
}

/// Replaces embedded image data with a short placeholder.
fn redact_images(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = match v {
                        Value::String(_) if key == "image_url" => {
                            Value::String(IMAGE_PLACEHOLDER.to_string())
                        }
                        _ => redact_images(v),
                    };
                    (key.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_images).collect()),
        _ => value.clone(),
    }
}
