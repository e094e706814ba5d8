use crate::{CollisionInfo, DroneCamera, ImageFrame, MultirotorState, Pose, Result, Vec3};
use std::time::Duration;

/// Blocking command and sensor interface to a single multirotor.
///
/// Each method returns once the vehicle has completed (or aborted) the
/// command. Implementations are shared between tool bindings, so they take
/// `&self` and handle their own synchronization.
pub trait FlightApi: Send + Sync {
    /// Arms or disarms the motors.
    fn arm(&self, armed: bool) -> Result<()>;

    fn takeoff(&self, timeout: Duration) -> Result<()>;

    fn land(&self, timeout: Duration) -> Result<()>;

    /// Holds the current position.
    fn hover(&self) -> Result<()>;

    /// Flies to `target` in the NED frame at `velocity` m/s.
    fn move_to_position(&self, target: Vec3, velocity: f64, timeout: Duration) -> Result<()>;

    /// Changes altitude to `z` while keeping the horizontal position.
    fn move_to_z(&self, z: f64, velocity: f64, timeout: Duration) -> Result<()>;

    /// Follows `path` waypoint by waypoint.
    fn move_on_path(&self, path: &[Vec3], velocity: f64, timeout: Duration) -> Result<()>;

    /// Captures an uncompressed-scene RGB frame from one camera.
    fn rgb_frame(&self, camera: DroneCamera) -> Result<ImageFrame>;

    /// Captures frames from several cameras, in request order.
    fn rgb_frames(&self, cameras: &[DroneCamera]) -> Result<Vec<ImageFrame>> {
        cameras.iter().map(|camera| self.rgb_frame(*camera)).collect()
    }

    fn multirotor_state(&self) -> Result<MultirotorState>;

    fn vehicle_pose(&self) -> Result<Pose>;

    fn collision_info(&self) -> Result<CollisionInfo>;
}
