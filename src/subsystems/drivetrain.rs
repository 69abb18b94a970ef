use chrono::Local;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::swerve::{
    ChassisSpeeds, DrivePosture, Pose2d, Rotation2d, SwerveDriveState, SwerveRequest,
};
use super::{Mechanisms, DRIVETRAIN};
use crate::command::commands::{run, FunctionalCommand};
use crate::command::{Command, SubsystemId};
use crate::config::SysIdConfig;

const NOMINAL_VOLTAGE: f64 = 12.0;

type TelemetryCallback = Box<dyn FnMut(&SwerveDriveState) + Send>;

/// Swerve drivetrain handle with a simulated gyro and odometry.
///
/// Applies one [`SwerveRequest`] per periodic. Field-centric requests are interpreted relative
/// to the operator's forward direction, which [`seed_field_centric`](Self::seed_field_centric)
/// resets to wherever the robot currently faces.
pub struct SwerveDrivetrain {
    request: SwerveRequest,
    state: SwerveDriveState,
    operator_forward: Rotation2d,
    speed_at_12_volts: f64,
    period: Duration,
    telemetry: Option<TelemetryCallback>,
}

impl SwerveDrivetrain {
    pub fn new(speed_at_12_volts: f64, period: Duration) -> Self {
        Self {
            request: SwerveRequest::Idle,
            state: SwerveDriveState {
                pose: Pose2d::default(),
                speeds: ChassisSpeeds::default(),
                posture: DrivePosture::Driving,
                odometry_period: period,
                timestamp: Local::now(),
            },
            operator_forward: Rotation2d::ZERO,
            speed_at_12_volts,
            period,
            telemetry: None,
        }
    }

    pub fn set_control(&mut self, request: SwerveRequest) {
        self.request = request;
    }

    pub fn request(&self) -> &SwerveRequest {
        &self.request
    }

    pub fn state(&self) -> &SwerveDriveState {
        &self.state
    }

    pub fn operator_forward(&self) -> Rotation2d {
        self.operator_forward
    }

    /// Makes the current heading the field-centric forward direction.
    pub fn seed_field_centric(&mut self) {
        self.operator_forward = self.state.pose.heading;
        info!(
            "Field-centric forward seeded at {:.1} deg",
            self.operator_forward.degrees()
        );
    }

    pub fn register_telemetry<F>(&mut self, callback: F)
    where
        F: FnMut(&SwerveDriveState) + Send + 'static,
    {
        self.telemetry = Some(Box::new(callback));
    }

    /// Disabled, the modules are unpowered whatever the active request is.
    pub fn periodic(&mut self, enabled: bool) {
        let heading = self.state.pose.heading;
        let request = if enabled {
            self.request
        } else {
            SwerveRequest::Idle
        };
        let (speeds, posture) = match request {
            SwerveRequest::Idle => (ChassisSpeeds::default(), DrivePosture::Driving),
            SwerveRequest::FieldCentric(request) => (
                request.robot_speeds(heading.minus(self.operator_forward)),
                DrivePosture::Driving,
            ),
            SwerveRequest::RobotCentric(request) => (request.robot_speeds(), DrivePosture::Driving),
            SwerveRequest::Brake => (ChassisSpeeds::default(), DrivePosture::Braked),
            SwerveRequest::PointWheelsAt(direction) => {
                (ChassisSpeeds::default(), DrivePosture::Pointing(direction))
            }
            SwerveRequest::SysIdTranslation { volts } => (
                ChassisSpeeds {
                    vx: volts / NOMINAL_VOLTAGE * self.speed_at_12_volts,
                    ..Default::default()
                },
                DrivePosture::Characterizing { volts },
            ),
        };

        let dt = self.period.as_secs_f64();
        let pose = &mut self.state.pose;
        pose.x += (speeds.vx * heading.cos() - speeds.vy * heading.sin()) * dt;
        pose.y += (speeds.vx * heading.sin() + speeds.vy * heading.cos()) * dt;
        pose.heading = heading.plus(Rotation2d::from_radians(speeds.omega * dt));

        self.state.speeds = speeds;
        self.state.posture = posture;
        self.state.timestamp = Local::now();

        if let Some(telemetry) = self.telemetry.as_mut() {
            telemetry(&self.state);
        }
    }
}

/// Applies the request produced by `request` every tick and idles the drive when it ends.
pub fn apply_request<F>(name: &str, mut request: F) -> FunctionalCommand<Mechanisms>
where
    F: FnMut() -> SwerveRequest + Send + 'static,
{
    run(name, &[DRIVETRAIN], move |mechanisms: &mut Mechanisms| {
        mechanisms.drivetrain.set_control(request())
    })
    .on_end(|mechanisms: &mut Mechanisms, _| {
        mechanisms.drivetrain.set_control(SwerveRequest::Idle)
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysIdMode {
    /// Slow voltage ramp
    Quasistatic,
    /// Sudden voltage step
    Dynamic,
}

/// Drives the translation motors through a voltage sweep for characterization.
pub struct SysIdCommand {
    name: String,
    mode: SysIdMode,
    direction: Direction,
    config: SysIdConfig,
    started: Option<Instant>,
}

pub fn sysid_quasistatic(config: &SysIdConfig, direction: Direction) -> SysIdCommand {
    SysIdCommand::new(SysIdMode::Quasistatic, direction, config)
}

pub fn sysid_dynamic(config: &SysIdConfig, direction: Direction) -> SysIdCommand {
    SysIdCommand::new(SysIdMode::Dynamic, direction, config)
}

impl SysIdCommand {
    fn new(mode: SysIdMode, direction: Direction, config: &SysIdConfig) -> Self {
        Self {
            name: format!("SysId {:?} {:?}", mode, direction),
            mode,
            direction,
            config: config.clone(),
            started: None,
        }
    }

    pub fn voltage(&self, elapsed: Duration) -> f64 {
        let magnitude = match self.mode {
            SysIdMode::Quasistatic => self.config.ramp_rate * elapsed.as_secs_f64(),
            SysIdMode::Dynamic => self.config.step_voltage,
        }
        .min(NOMINAL_VOLTAGE);

        match self.direction {
            Direction::Forward => magnitude,
            Direction::Reverse => -magnitude,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|started| started.elapsed()).unwrap_or_default()
    }
}

impl Command<Mechanisms> for SysIdCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> &[SubsystemId] {
        &[DRIVETRAIN]
    }

    fn initialize(&mut self, _mechanisms: &mut Mechanisms) {
        info!("{} started", self.name);
        self.started = Some(Instant::now());
    }

    fn execute(&mut self, mechanisms: &mut Mechanisms) {
        let volts = self.voltage(self.elapsed());
        debug!("{} applying {:.2} V", self.name, volts);
        mechanisms
            .drivetrain
            .set_control(SwerveRequest::SysIdTranslation { volts });
    }

    fn end(&mut self, mechanisms: &mut Mechanisms, interrupted: bool) {
        mechanisms.drivetrain.set_control(SwerveRequest::Idle);
        info!(
            "{} {} after {:.2} s",
            self.name,
            if interrupted { "stopped" } else { "timed out" },
            self.elapsed().as_secs_f64()
        );
        self.started = None;
    }

    fn is_finished(&mut self, _mechanisms: &Mechanisms) -> bool {
        self.elapsed().as_secs_f64() >= self.config.timeout_secs
    }
}
