//! Flight and camera tools bound to a [`FlightApi`].

use super::{Arguments, BindingError, ToolRegistry};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sim::{DroneCamera, FlightApi, Vec3};
use std::sync::Arc;
use std::time::Duration;

/// Registers the drone tool set on `tools`, in prompt order.
pub fn register<F>(tools: &mut ToolRegistry, api: Arc<F>)
where
    F: FlightApi + ?Sized + 'static,
{
    let drone = Arc::clone(&api);
    tools.register(
        "arm",
        "Arm or disarm the motors",
        json!({
            "type": "object",
            "properties": {
                "armed": {"type": "boolean", "description": "true = arm, false = disarm"}
            },
            "required": ["armed"]
        }),
        move |args| {
            let ArmArgs { armed } = parse::<ArmArgs>(args)?;
            drone.arm(armed)?;
            Ok(Value::Null)
        },
    );

    let drone = Arc::clone(&api);
    tools.register(
        "takeoff",
        "Take off and climb to a safe hover height",
        json!({
            "type": "object",
            "properties": {
                "timeout_sec": {"type": "number", "description": "Timeout in seconds", "default": 10.0}
            }
        }),
        move |args| {
            let TakeoffArgs { timeout_sec } = parse::<TakeoffArgs>(args)?;
            drone.takeoff(seconds(timeout_sec)?)?;
            Ok(Value::Null)
        },
    );

    let drone = Arc::clone(&api);
    tools.register(
        "land",
        "Land at the current horizontal position",
        json!({
            "type": "object",
            "properties": {
                "timeout_sec": {"type": "number", "description": "Timeout in seconds", "default": 20.0}
            }
        }),
        move |args| {
            let LandArgs { timeout_sec } = parse::<LandArgs>(args)?;
            drone.land(seconds(timeout_sec)?)?;
            Ok(Value::Null)
        },
    );

    let drone = Arc::clone(&api);
    tools.register(
        "hover",
        "Hover, holding the current position and attitude",
        json!({"type": "object", "properties": {}}),
        move |args| {
            parse::<HoverArgs>(args)?;
            drone.hover()?;
            Ok(Value::Null)
        },
    );

    let drone = Arc::clone(&api);
    tools.register(
        "move_to_position",
        "Fly to a position (NED frame, metres)",
        json!({
            "type": "object",
            "properties": {
                "x": {"type": "number", "description": "X (north), metres"},
                "y": {"type": "number", "description": "Y (east), metres"},
                "z": {"type": "number", "description": "Z (down), metres; negative is up"},
                "velocity": {"type": "number", "description": "Speed in m/s", "default": 5.0},
                "timeout_sec": {"type": "number", "description": "Timeout in seconds", "default": 60.0}
            },
            "required": ["x", "y", "z"]
        }),
        move |args| {
            let a: MoveToPositionArgs = parse(args)?;
            drone.move_to_position(Vec3::new(a.x, a.y, a.z), a.velocity, seconds(a.timeout_sec)?)?;
            Ok(Value::Null)
        },
    );

    let drone = Arc::clone(&api);
    tools.register(
        "move_to_z",
        "Change height only (Z coordinate)",
        json!({
            "type": "object",
            "properties": {
                "z": {"type": "number", "description": "Target Z, metres; negative is up"},
                "velocity": {"type": "number", "description": "Speed in m/s", "default": 2.0},
                "timeout_sec": {"type": "number", "description": "Timeout in seconds", "default": 30.0}
            },
            "required": ["z"]
        }),
        move |args| {
            let a: MoveToZArgs = parse(args)?;
            drone.move_to_z(a.z, a.velocity, seconds(a.timeout_sec)?)?;
            Ok(Value::Null)
        },
    );

    let drone = Arc::clone(&api);
    tools.register(
        "move_on_path",
        "Fly along a path of waypoints",
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "array",
                    "description": "Waypoints, each [x, y, z]",
                    "items": {
                        "type": "array",
                        "items": {"type": "number"},
                        "minItems": 3,
                        "maxItems": 3
                    }
                },
                "velocity": {"type": "number", "description": "Speed in m/s", "default": 5.0},
                "timeout_sec": {"type": "number", "description": "Timeout in seconds", "default": 120.0}
            },
            "required": ["path"]
        }),
        move |args| {
            let a: MoveOnPathArgs = parse(args)?;
            let path: Vec<Vec3> = a.path.into_iter().map(Vec3::from).collect();
            drone.move_on_path(&path, a.velocity, seconds(a.timeout_sec)?)?;
            Ok(Value::Null)
        },
    );

    let names: Vec<&str> = DroneCamera::ALL.iter().map(|c| c.name()).collect();
    let drone = api;
    tools.register(
        "get_camera_image",
        "Capture an image from a specific camera",
        json!({
            "type": "object",
            "properties": {
                "camera": {
                    "type": "string",
                    "description": format!("Camera name, one of: {}", names.join(", ")),
                    "enum": names
                }
            },
            "required": ["camera"]
        }),
        move |args| {
            let CameraArgs { camera } = parse::<CameraArgs>(args)?;
            let camera: DroneCamera = camera.parse()?;
            let frame = drone.rgb_frame(camera)?;
            Ok(json!({
                "camera": camera.name(),
                "width": frame.width,
                "height": frame.height,
                "image_url": frame.to_data_url(),
                "message": format!("Captured an image from the {} camera", camera.name()),
            }))
        },
    );
}

/// Deserializes arguments, treating explicit nulls as absent.
fn parse<T: DeserializeOwned>(args: &Arguments) -> Result<T, BindingError> {
    let present: Arguments = args
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok(serde_json::from_value(Value::Object(present))?)
}

fn seconds(secs: f64) -> Result<Duration, BindingError> {
    Duration::try_from_secs_f64(secs).map_err(|_| format!("invalid timeout: {secs}").into())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ArmArgs {
    armed: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TakeoffArgs {
    #[serde(default = "default_takeoff_timeout")]
    timeout_sec: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LandArgs {
    #[serde(default = "default_land_timeout")]
    timeout_sec: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HoverArgs {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveToPositionArgs {
    x: f64,
    y: f64,
    z: f64,
    #[serde(default = "default_velocity")]
    velocity: f64,
    #[serde(default = "default_move_timeout")]
    timeout_sec: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveToZArgs {
    z: f64,
    #[serde(default = "default_climb_velocity")]
    velocity: f64,
    #[serde(default = "default_climb_timeout")]
    timeout_sec: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveOnPathArgs {
    path: Vec<[f64; 3]>,
    #[serde(default = "default_velocity")]
    velocity: f64,
    #[serde(default = "default_path_timeout")]
    timeout_sec: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CameraArgs {
    camera: String,
}

fn default_takeoff_timeout() -> f64 {
    10.0
}

fn default_land_timeout() -> f64 {
    20.0
}

fn default_velocity() -> f64 {
    5.0
}

fn default_move_timeout() -> f64 {
    60.0
}

fn default_climb_velocity() -> f64 {
    2.0
}

fn default_climb_timeout() -> f64 {
    30.0
}

fn default_path_timeout() -> f64 {
    120.0
}
