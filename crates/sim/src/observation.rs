use crate::{DroneCamera, FlightApi, Result};
use serde_json::{Value, json};

/// What [`observation`] should include besides pose and state.
#[derive(Debug, Clone, Default)]
pub struct ObservationOptions {
    /// Cameras whose frame metadata is included under `rgb`.
    pub cameras: Vec<DroneCamera>,
    /// Embed each frame as a data URL next to its metadata.
    pub include_data: bool,
}

/// Collects pose, state, collision and optional camera frames in one value.
pub fn observation(api: &dyn FlightApi, options: &ObservationOptions) -> Result<Value> {
    let pose = api.vehicle_pose()?;
    let state = api.multirotor_state()?;
    let collision = api.collision_info()?;

    let mut out = json!({
        "time": { "unix_ms": chrono::Utc::now().timestamp_millis() },
        "pose": pose,
        "state": state,
        "collision": collision,
    });

    if !options.cameras.is_empty() {
        let frames = api.rgb_frames(&options.cameras)?;
        let rgb: serde_json::Map<String, Value> = options
            .cameras
            .iter()
            .zip(frames)
            .map(|(camera, frame)| {
                let mut entry = json!({
                    "camera_id": camera.airsim_name(),
                    "width": frame.width,
                    "height": frame.height,
                    "mime": frame.mime,
                    "bytes": frame.data.len(),
                });
                if options.include_data {
                    entry["image_url"] = Value::String(frame.to_data_url());
                }
                (camera.name().to_string(), entry)
            })
            .collect();
        out["rgb"] = Value::Object(rgb);
    }

    Ok(out)
}
