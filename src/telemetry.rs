use tracing::debug;

use crate::subsystems::swerve::{Pose2d, SwerveDriveState};

/// Logs drivetrain state every periodic at debug level.
pub struct Telemetry {
    max_speed: f64,
    last_pose: Option<Pose2d>,
}

impl Telemetry {
    pub fn new(max_speed: f64) -> Self {
        Self {
            max_speed,
            last_pose: None,
        }
    }

    /// Fraction of the top speed the robot is currently translating at.
    pub fn speed_fraction(&self, state: &SwerveDriveState) -> f64 {
        if self.max_speed <= 0.0 {
            return 0.0;
        }
        state.speeds.vx.hypot(state.speeds.vy) / self.max_speed
    }

    pub fn telemeterize(&mut self, state: &SwerveDriveState) {
        let travelled = self
            .last_pose
            .map(|last| (state.pose.x - last.x).hypot(state.pose.y - last.y))
            .unwrap_or_default();

        debug!(
            target: "telemetry",
            "pose=({:.3}, {:.3}) heading={:.1}deg speed={:.2}m/s ({:.0}%) omega={:.2}rad/s posture={:?} moved={:.4}m period={}ms",
            state.pose.x,
            state.pose.y,
            state.pose.heading.degrees(),
            state.speeds.vx.hypot(state.speeds.vy),
            self.speed_fraction(state) * 100.0,
            state.speeds.omega,
            state.posture,
            travelled,
            state.odometry_period.as_millis()
        );

        self.last_pose = Some(state.pose);
    }
}
