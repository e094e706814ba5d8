//! Flight and sensor access for a simulated multirotor.
//!
//! This crate is the actuation side of the drone agent. It defines the
//! [`FlightApi`] boundary the agent drives, the value types that cross it
//! (poses, kinematics, camera frames), and [`KinematicSim`], an in-process
//! vehicle that executes commands instantly without any flight dynamics.
//!
//! # Overview
//!
//! - **FlightApi**: arm/takeoff/land/hover, position and path moves, camera
//!   frames and state queries. Every call blocks until the command finishes
//!   and returns a [`FlightError`] on failure.
//! - **DroneCamera**: the five mounted cameras, addressed by their upper snake
//!   case names (`FRONT_CENTER`, ...).
//! - **ImageFrame**: an encoded camera frame that can be embedded into a model
//!   request as a `data:` URL.
//!
//! All positions use the NED convention: `z` grows downwards, so altitude
//! above the reference is `-z`.
//!
//! # Example
//!
//! ```
//! use sim::{DroneCamera, FlightApi, KinematicSim};
//! use std::time::Duration;
//!
//! let drone = KinematicSim::new();
//! drone.arm(true)?;
//! drone.takeoff(Duration::from_secs(10))?;
//!
//! let state = drone.multirotor_state()?;
//! assert!(state.kinematics.position.z < 0.0);
//!
//! let frame = drone.rgb_frame(DroneCamera::FrontCenter)?;
//! assert!(frame.to_data_url().starts_with("data:image/png;base64,"));
//! # Ok::<(), sim::FlightError>(())
//! ```

mod camera;
mod error;
mod flight;
mod image;
mod kinematic;
mod observation;
mod state;

pub use camera::DroneCamera;
pub use error::{FlightError, Result};
pub use flight::FlightApi;
pub use image::ImageFrame;
pub use kinematic::{KinematicSim, TAKEOFF_ALTITUDE};
pub use observation::{ObservationOptions, observation};
pub use state::{CollisionInfo, Kinematics, LandedState, MultirotorState, Pose, Quaternion, Vec3};
