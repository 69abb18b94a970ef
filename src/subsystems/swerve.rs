//! Swerve drive requests and state
//!
//! Requests describe what the drivetrain should do this tick; the drivetrain turns them into
//! robot-relative [`ChassisSpeeds`]. Module-level kinematics are out of scope.

use chrono::{DateTime, Local};
use std::f64::consts::PI;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rotation2d {
    radians: f64,
}

impl Rotation2d {
    pub const ZERO: Rotation2d = Rotation2d { radians: 0.0 };

    pub fn from_radians(radians: f64) -> Self {
        Self { radians }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    /// Direction of the vector `(x, y)`. A zero-length vector yields zero rotation.
    pub fn from_components(x: f64, y: f64) -> Self {
        if x.hypot(y) < 1e-6 {
            return Self::ZERO;
        }
        Self::from_radians(y.atan2(x))
    }

    pub fn radians(&self) -> f64 {
        self.radians
    }

    /// Angle in degrees, wrapped to (-180, 180].
    pub fn degrees(&self) -> f64 {
        let mut wrapped = self.radians % (2.0 * PI);
        if wrapped > PI {
            wrapped -= 2.0 * PI;
        } else if wrapped <= -PI {
            wrapped += 2.0 * PI;
        }
        wrapped.to_degrees()
    }

    pub fn cos(&self) -> f64 {
        self.radians.cos()
    }

    pub fn sin(&self) -> f64 {
        self.radians.sin()
    }

    pub fn plus(&self, other: Rotation2d) -> Rotation2d {
        Rotation2d::from_radians(self.radians + other.radians)
    }

    pub fn minus(&self, other: Rotation2d) -> Rotation2d {
        Rotation2d::from_radians(self.radians - other.radians)
    }
}

/// Robot-relative velocities: forward (m/s), left (m/s), counterclockwise (rad/s).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChassisSpeeds {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose2d {
    pub x: f64,
    pub y: f64,
    pub heading: Rotation2d,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriveRequestType {
    #[default]
    OpenLoopVoltage,
    Velocity,
}

/// Field-relative drive; X is away from the driver station, Y is to the left.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FieldCentric {
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub rotational_rate: f64,
    /// Translation speeds whose combined magnitude is below this are zeroed
    pub deadband: f64,
    pub rotational_deadband: f64,
    pub drive_request_type: DriveRequestType,
}

impl FieldCentric {
    pub fn with_velocity_x(mut self, velocity_x: f64) -> Self {
        self.velocity_x = velocity_x;
        self
    }

    pub fn with_velocity_y(mut self, velocity_y: f64) -> Self {
        self.velocity_y = velocity_y;
        self
    }

    pub fn with_rotational_rate(mut self, rotational_rate: f64) -> Self {
        self.rotational_rate = rotational_rate;
        self
    }

    pub fn with_deadband(mut self, deadband: f64) -> Self {
        self.deadband = deadband;
        self
    }

    pub fn with_rotational_deadband(mut self, rotational_deadband: f64) -> Self {
        self.rotational_deadband = rotational_deadband;
        self
    }

    pub fn with_drive_request_type(mut self, drive_request_type: DriveRequestType) -> Self {
        self.drive_request_type = drive_request_type;
        self
    }

    /// Robot-relative speeds given the robot's heading relative to field forward.
    pub fn robot_speeds(&self, heading: Rotation2d) -> ChassisSpeeds {
        let (vx, vy) = translation_deadband(self.velocity_x, self.velocity_y, self.deadband);
        ChassisSpeeds {
            vx: vx * heading.cos() + vy * heading.sin(),
            vy: -vx * heading.sin() + vy * heading.cos(),
            omega: rotational_deadband(self.rotational_rate, self.rotational_deadband),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RobotCentric {
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub rotational_rate: f64,
    pub deadband: f64,
    pub rotational_deadband: f64,
    pub drive_request_type: DriveRequestType,
}

impl RobotCentric {
    pub fn with_velocity_x(mut self, velocity_x: f64) -> Self {
        self.velocity_x = velocity_x;
        self
    }

    pub fn with_velocity_y(mut self, velocity_y: f64) -> Self {
        self.velocity_y = velocity_y;
        self
    }

    pub fn with_rotational_rate(mut self, rotational_rate: f64) -> Self {
        self.rotational_rate = rotational_rate;
        self
    }

    pub fn with_drive_request_type(mut self, drive_request_type: DriveRequestType) -> Self {
        self.drive_request_type = drive_request_type;
        self
    }

    pub fn robot_speeds(&self) -> ChassisSpeeds {
        let (vx, vy) = translation_deadband(self.velocity_x, self.velocity_y, self.deadband);
        ChassisSpeeds {
            vx,
            vy,
            omega: rotational_deadband(self.rotational_rate, self.rotational_deadband),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SwerveRequest {
    #[default]
    Idle,
    FieldCentric(FieldCentric),
    RobotCentric(RobotCentric),
    /// Modules in an X so the robot resists being pushed
    Brake,
    /// Stationary, all modules facing the given direction
    PointWheelsAt(Rotation2d),
    /// Forward translation voltage for characterization
    SysIdTranslation { volts: f64 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DrivePosture {
    #[default]
    Driving,
    Braked,
    Pointing(Rotation2d),
    Characterizing { volts: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwerveDriveState {
    pub pose: Pose2d,
    pub speeds: ChassisSpeeds,
    pub posture: DrivePosture,
    pub odometry_period: Duration,
    pub timestamp: DateTime<Local>,
}

fn translation_deadband(vx: f64, vy: f64, deadband: f64) -> (f64, f64) {
    if vx.hypot(vy) < deadband {
        (0.0, 0.0)
    } else {
        (vx, vy)
    }
}

fn rotational_deadband(omega: f64, deadband: f64) -> f64 {
    if omega.abs() < deadband {
        0.0
    } else {
        omega
    }
}
