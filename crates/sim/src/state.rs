//! Vehicle state types (NED frame).

use serde::{Deserialize, Serialize};

/// A vector in the NED frame (metres, or metres per second for velocities).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Altitude above the reference plane (`-z`).
    pub fn altitude(&self) -> f64 {
        // adding 0.0 folds -0.0 into 0.0
        -self.z + 0.0
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Estimated kinematics of the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub position: Vec3,
    pub orientation: Quaternion,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub linear_acceleration: Vec3,
    pub angular_acceleration: Vec3,
}

/// Whether the vehicle rests on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandedState {
    Landed,
    Flying,
}

/// Snapshot returned by a multirotor state query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultirotorState {
    pub timestamp_ns: u64,
    pub landed_state: LandedState,
    pub ready: bool,
    pub kinematics: Kinematics,
}

/// Ground-truth pose of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

/// Most recent collision reported by the simulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollisionInfo {
    pub has_collided: bool,
    pub object_name: String,
    pub impact_point: Vec3,
    pub normal: Vec3,
    pub timestamp_ns: u64,
}
