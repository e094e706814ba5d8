use crate::FlightError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five cameras mounted on the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DroneCamera {
    FrontCenter,
    FrontLeft,
    FrontRight,
    BottomCenter,
    BackCenter,
}

impl DroneCamera {
    /// All cameras, in the order they are presented to the model.
    pub const ALL: [DroneCamera; 5] = [
        DroneCamera::FrontCenter,
        DroneCamera::FrontLeft,
        DroneCamera::FrontRight,
        DroneCamera::BackCenter,
        DroneCamera::BottomCenter,
    ];

    /// Logical name used in prompts and tool arguments.
    pub fn name(self) -> &'static str {
        match self {
            Self::FrontCenter => "FRONT_CENTER",
            Self::FrontLeft => "FRONT_LEFT",
            Self::FrontRight => "FRONT_RIGHT",
            Self::BottomCenter => "BOTTOM_CENTER",
            Self::BackCenter => "BACK_CENTER",
        }
    }

    /// Camera id understood by the simulator.
    pub fn airsim_name(self) -> &'static str {
        match self {
            Self::FrontCenter => "0",
            Self::FrontLeft => "1",
            Self::FrontRight => "2",
            Self::BottomCenter => "3",
            Self::BackCenter => "4",
        }
    }

    /// Short human-readable mounting position.
    pub fn placement(self) -> &'static str {
        match self {
            Self::FrontCenter => "front center",
            Self::FrontLeft => "front left",
            Self::FrontRight => "front right",
            Self::BottomCenter => "bottom center",
            Self::BackCenter => "back center",
        }
    }
}

impl fmt::Display for DroneCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DroneCamera {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|camera| camera.name() == s)
            .ok_or_else(|| FlightError::UnknownCamera(s.to_string()))
    }
}
