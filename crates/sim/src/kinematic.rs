use crate::{
    CollisionInfo, DroneCamera, FlightApi, FlightError, ImageFrame, Kinematics, LandedState,
    MultirotorState, Pose, Result, Vec3,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// NED `z` the vehicle climbs to on takeoff.
pub const TAKEOFF_ALTITUDE: f64 = -3.0;

/// Simulated time advanced by every command.
const TICK_NS: u64 = 10_000_000;

#[derive(Debug)]
struct State {
    armed: bool,
    landed: LandedState,
    position: Vec3,
    clock_ns: u64,
    commands: Vec<String>,
    failures: HashMap<&'static str, String>,
}

impl State {
    fn begin(&mut self, operation: &'static str, detail: String) -> Result<()> {
        self.clock_ns += TICK_NS;
        self.commands.push(detail);
        if let Some(reason) = self.failures.remove(operation) {
            return Err(FlightError::Command { operation, reason });
        }
        Ok(())
    }

    fn require_airborne(&self) -> Result<()> {
        if !self.armed {
            return Err(FlightError::NotArmed);
        }
        if self.landed == LandedState::Landed {
            return Err(FlightError::NotAirborne);
        }
        Ok(())
    }
}

/// An in-process vehicle that completes every command instantly.
///
/// It keeps only position and arm/landed flags, which is enough to exercise
/// the agent loop end to end without a running simulator. Failures can be
/// scripted per operation with [`KinematicSim::fail_next`].
#[derive(Debug)]
pub struct KinematicSim {
    state: Mutex<State>,
    frame: ImageFrame,
}

impl KinematicSim {
    /// Creates a disarmed vehicle at the origin that serves the placeholder
    /// frame from every camera.
    pub fn new() -> Self {
        // decoding the embedded constant does not fail
        let frame = ImageFrame::placeholder().unwrap_or(ImageFrame {
            width: 1,
            height: 1,
            mime: "image/png",
            data: Vec::new(),
        });
        Self::with_frame(frame)
    }

    /// Creates a vehicle that serves `frame` from every camera.
    pub fn with_frame(frame: ImageFrame) -> Self {
        Self {
            state: Mutex::new(State {
                armed: false,
                landed: LandedState::Landed,
                position: Vec3::ZERO,
                clock_ns: 0,
                commands: Vec::new(),
                failures: HashMap::new(),
            }),
            frame,
        }
    }

    /// Creates a vehicle that serves the PNG at `path` from every camera.
    pub fn from_image_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::with_frame(ImageFrame::from_png(data)?))
    }

    /// Makes the next call of `operation` fail with `reason`.
    ///
    /// Operation names match the [`FlightApi`] method names, e.g. `"takeoff"`.
    pub fn fail_next(&self, operation: &'static str, reason: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.insert(operation, reason.into());
        }
    }

    /// Commands received so far, oldest first.
    pub fn command_log(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.commands.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| FlightError::Unavailable)
    }
}

impl Default for KinematicSim {
    fn default() -> Self {
        Self::new()
    }
}

fn check_velocity(velocity: f64) -> Result<()> {
    if velocity.is_finite() && velocity > 0.0 {
        Ok(())
    } else {
        Err(FlightError::InvalidArgument(format!(
            "velocity must be positive, got {velocity}"
        )))
    }
}

impl FlightApi for KinematicSim {
    fn arm(&self, armed: bool) -> Result<()> {
        let mut state = self.lock()?;
        state.begin("arm", format!("arm({armed})"))?;
        if !armed && state.landed == LandedState::Flying {
            return Err(FlightError::Command {
                operation: "arm",
                reason: "cannot disarm while airborne".to_string(),
            });
        }
        state.armed = armed;
        debug!(armed, "arm state changed");
        Ok(())
    }

    fn takeoff(&self, timeout: Duration) -> Result<()> {
        let mut state = self.lock()?;
        state.begin("takeoff", format!("takeoff({}s)", timeout.as_secs_f64()))?;
        if !state.armed {
            return Err(FlightError::NotArmed);
        }
        state.landed = LandedState::Flying;
        state.position.z = TAKEOFF_ALTITUDE;
        debug!(z = state.position.z, "takeoff complete");
        Ok(())
    }

    fn land(&self, timeout: Duration) -> Result<()> {
        let mut state = self.lock()?;
        state.begin("land", format!("land({}s)", timeout.as_secs_f64()))?;
        if state.landed == LandedState::Landed {
            return Ok(());
        }
        state.landed = LandedState::Landed;
        state.position.z = 0.0;
        debug!("landed");
        Ok(())
    }

    fn hover(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.begin("hover", "hover()".to_string())?;
        state.require_airborne()
    }

    fn move_to_position(&self, target: Vec3, velocity: f64, timeout: Duration) -> Result<()> {
        let mut state = self.lock()?;
        state.begin(
            "move_to_position",
            format!(
                "move_to_position({}, {}, {}, v={velocity}, {}s)",
                target.x,
                target.y,
                target.z,
                timeout.as_secs_f64()
            ),
        )?;
        check_velocity(velocity)?;
        state.require_airborne()?;
        state.position = target;
        Ok(())
    }

    fn move_to_z(&self, z: f64, velocity: f64, timeout: Duration) -> Result<()> {
        let mut state = self.lock()?;
        state.begin(
            "move_to_z",
            format!("move_to_z({z}, v={velocity}, {}s)", timeout.as_secs_f64()),
        )?;
        check_velocity(velocity)?;
        state.require_airborne()?;
        state.position.z = z;
        Ok(())
    }

    fn move_on_path(&self, path: &[Vec3], velocity: f64, timeout: Duration) -> Result<()> {
        let mut state = self.lock()?;
        state.begin(
            "move_on_path",
            format!(
                "move_on_path({} waypoints, v={velocity}, {}s)",
                path.len(),
                timeout.as_secs_f64()
            ),
        )?;
        let Some(last) = path.last() else {
            return Err(FlightError::InvalidArgument("path is empty".to_string()));
        };
        check_velocity(velocity)?;
        state.require_airborne()?;
        state.position = *last;
        Ok(())
    }

    fn rgb_frame(&self, camera: DroneCamera) -> Result<ImageFrame> {
        let mut state = self.lock()?;
        state.begin("rgb_frame", format!("rgb_frame({camera})"))?;
        Ok(self.frame.clone())
    }

    fn multirotor_state(&self) -> Result<MultirotorState> {
        let state = self.lock()?;
        Ok(MultirotorState {
            timestamp_ns: state.clock_ns,
            landed_state: state.landed,
            ready: state.armed,
            kinematics: Kinematics {
                position: state.position,
                ..Kinematics::default()
            },
        })
    }

    fn vehicle_pose(&self) -> Result<Pose> {
        let state = self.lock()?;
        Ok(Pose {
            position: state.position,
            orientation: Default::default(),
        })
    }

    fn collision_info(&self) -> Result<CollisionInfo> {
        let state = self.lock()?;
        Ok(CollisionInfo {
            timestamp_ns: state.clock_ns,
            ..CollisionInfo::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(10);

    #[test]
    fn takeoff_requires_arming() {
        let sim = KinematicSim::new();
        assert!(matches!(sim.takeoff(T), Err(FlightError::NotArmed)));

        sim.arm(true).unwrap();
        sim.takeoff(T).unwrap();
        let state = sim.multirotor_state().unwrap();
        assert_eq!(state.landed_state, LandedState::Flying);
        assert_eq!(state.kinematics.position.z, TAKEOFF_ALTITUDE);
    }

    #[test]
    fn moves_require_flight() {
        let sim = KinematicSim::new();
        sim.arm(true).unwrap();
        let err = sim
            .move_to_position(Vec3::new(1.0, 2.0, -4.0), 5.0, T)
            .unwrap_err();
        assert!(matches!(err, FlightError::NotAirborne));

        sim.takeoff(T).unwrap();
        sim.move_to_position(Vec3::new(1.0, 2.0, -4.0), 5.0, T)
            .unwrap();
        sim.move_to_z(-8.0, 2.0, T).unwrap();
        assert_eq!(sim.vehicle_pose().unwrap().position, Vec3::new(1.0, 2.0, -8.0));
    }

    #[test]
    fn path_ends_at_last_waypoint() {
        let sim = KinematicSim::new();
        sim.arm(true).unwrap();
        sim.takeoff(T).unwrap();

        assert!(matches!(
            sim.move_on_path(&[], 5.0, T),
            Err(FlightError::InvalidArgument(_))
        ));

        let path = [Vec3::new(5.0, 0.0, -3.0), Vec3::new(5.0, 5.0, -6.0)];
        sim.move_on_path(&path, 5.0, T).unwrap();
        assert_eq!(sim.vehicle_pose().unwrap().position, path[1]);
    }

    #[test]
    fn cannot_disarm_in_flight() {
        let sim = KinematicSim::new();
        sim.arm(true).unwrap();
        sim.takeoff(T).unwrap();
        assert!(sim.arm(false).is_err());

        sim.land(T).unwrap();
        sim.arm(false).unwrap();
        assert_eq!(sim.vehicle_pose().unwrap().position.z, 0.0);
    }

    #[test]
    fn scripted_failure_applies_once() {
        let sim = KinematicSim::new();
        sim.arm(true).unwrap();
        sim.fail_next("takeoff", "motor fault");

        let err = sim.takeoff(T).unwrap_err();
        assert_eq!(err.to_string(), "takeoff failed: motor fault");
        sim.takeoff(T).unwrap();
    }

    #[test]
    fn rejects_non_positive_velocity() {
        let sim = KinematicSim::new();
        sim.arm(true).unwrap();
        sim.takeoff(T).unwrap();
        assert!(matches!(
            sim.move_to_z(-5.0, 0.0, T),
            Err(FlightError::InvalidArgument(_))
        ));
    }

    #[test]
    fn records_commands_in_order() {
        let sim = KinematicSim::new();
        sim.arm(true).unwrap();
        sim.takeoff(T).unwrap();
        sim.rgb_frame(DroneCamera::BottomCenter).unwrap();

        let log = sim.command_log();
        assert_eq!(log, vec!["arm(true)", "takeoff(10s)", "rgb_frame(BOTTOM_CENTER)"]);
    }

    #[test]
    fn serves_frames_for_all_cameras() {
        let sim = KinematicSim::new();
        let frames = sim.rgb_frames(&DroneCamera::ALL).unwrap();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.width == 1));
    }

    #[test]
    fn loads_frame_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        std::fs::write(&path, ImageFrame::placeholder().unwrap().data).unwrap();

        let sim = KinematicSim::from_image_file(&path).unwrap();
        assert_eq!(sim.rgb_frame(DroneCamera::FrontCenter).unwrap().height, 1);
    }
}
