//! Robot wiring: subsystems, controller bindings and the autonomous chooser.

use std::f64::consts::TAU;
use std::time::Duration;
use tracing::{info, warn};

use crate::auto::{build_auto_chooser, AutoChooser, Dashboard};
use crate::command::commands::{run, run_once};
use crate::command::{Command, CommandId, CommandScheduler, SchedulerError, Trigger};
use crate::config::RobotConfig;
use crate::controller::XboxController;
use crate::subsystems::coral_algae::IntakeMode;
use crate::subsystems::drivetrain::{apply_request, sysid_dynamic, sysid_quasistatic, Direction};
use crate::subsystems::swerve::{
    DriveRequestType, FieldCentric, RobotCentric, Rotation2d, SwerveRequest,
};
use crate::subsystems::{Mechanisms, CORAL_ALGAE, DRIVETRAIN, ELEVATOR};
use crate::telemetry::Telemetry;

pub const AUTO_MODE_KEY: &str = "Auto Mode";

/// Zeroes `value` when its magnitude is below `threshold`; passes it through unchanged otherwise.
pub fn deadband(value: f64, threshold: f64) -> f64 {
    if value.abs() < threshold {
        0.0
    } else {
        value
    }
}

pub struct RobotContainer {
    scheduler: CommandScheduler<Mechanisms>,
    mechanisms: Mechanisms,
    driver: XboxController,
    operator: XboxController,
    auto_chooser: AutoChooser<Mechanisms>,
    dashboard: Dashboard,
    autonomous: Option<CommandId>,
    max_speed: f64,
    max_angular_rate: f64,
}

impl RobotContainer {
    pub fn new(
        config: &RobotConfig,
        driver: XboxController,
        operator: XboxController,
        period: Duration,
    ) -> Result<Self, SchedulerError> {
        let max_speed = config.drive.speed_at_12_volts;
        let max_angular_rate = config.drive.max_angular_rotations_per_sec * TAU;

        let mut mechanisms = Mechanisms::new(config, period);
        let mut telemetry = Telemetry::new(max_speed);
        mechanisms
            .drivetrain
            .register_telemetry(move |state| telemetry.telemeterize(state));

        let mut scheduler = CommandScheduler::new();
        for subsystem in Mechanisms::ALL {
            scheduler.register_subsystem(subsystem);
        }

        let auto_chooser = build_auto_chooser(&config.autonomous);
        let mut dashboard = Dashboard::new();
        dashboard.put_data(AUTO_MODE_KEY, &auto_chooser);

        let mut container = Self {
            scheduler,
            mechanisms,
            driver,
            operator,
            auto_chooser,
            dashboard,
            autonomous: None,
            max_speed,
            max_angular_rate,
        };
        container.configure_bindings(config)?;

        info!(
            "Robot container ready: max speed {:.2} m/s, max angular rate {:.2} rad/s",
            max_speed, max_angular_rate
        );
        Ok(container)
    }

    fn configure_bindings(&mut self, config: &RobotConfig) -> Result<(), SchedulerError> {
        self.configure_drive_bindings(config)?;
        self.configure_elevator_bindings(config)?;
        self.configure_coral_algae_bindings(config)?;
        Ok(())
    }

    fn configure_drive_bindings(&mut self, config: &RobotConfig) -> Result<(), SchedulerError> {
        let max_speed = self.max_speed;
        let max_angular_rate = self.max_angular_rate;
        let drive = FieldCentric::default()
            .with_deadband(max_speed * config.drive.translation_deadband)
            .with_rotational_deadband(max_angular_rate * config.drive.rotational_deadband)
            .with_drive_request_type(DriveRequestType::OpenLoopVoltage);

        let driver = self.driver.clone();
        self.scheduler.set_default_command(
            DRIVETRAIN,
            apply_request("Field Centric Drive", move || {
                SwerveRequest::FieldCentric(
                    drive
                        .with_velocity_x(-driver.left_y() * max_speed)
                        .with_velocity_y(-driver.left_x() * max_speed)
                        .with_rotational_rate(-driver.right_x() * max_angular_rate),
                )
            }),
        )?;

        self.scheduler.while_true(
            self.driver.a(),
            apply_request("Brake", || SwerveRequest::Brake),
        );

        let driver = self.driver.clone();
        self.scheduler.while_true(
            self.driver.b(),
            apply_request("Point Wheels", move || {
                SwerveRequest::PointWheelsAt(Rotation2d::from_components(
                    -driver.left_y(),
                    -driver.left_x(),
                ))
            }),
        );

        let nudge = config.drive.nudge_speed;
        self.scheduler.while_true(
            self.driver.pov(0),
            apply_request("Nudge Forward", move || {
                SwerveRequest::RobotCentric(RobotCentric::default().with_velocity_x(nudge))
            }),
        );
        self.scheduler.while_true(
            self.driver.pov(180),
            apply_request("Nudge Backward", move || {
                SwerveRequest::RobotCentric(RobotCentric::default().with_velocity_x(-nudge))
            }),
        );

        let sysid = &config.drive.sysid;
        let combos = [
            (self.driver.back(), self.driver.y(), sysid_dynamic(sysid, Direction::Forward)),
            (self.driver.back(), self.driver.x(), sysid_dynamic(sysid, Direction::Reverse)),
            (self.driver.start(), self.driver.y(), sysid_quasistatic(sysid, Direction::Forward)),
            (self.driver.start(), self.driver.x(), sysid_quasistatic(sysid, Direction::Reverse)),
        ];
        for (modifier, button, command) in combos {
            let trigger = self.characterization_combo(modifier, button);
            self.scheduler.while_true(trigger, command);
        }

        self.scheduler.on_true(
            self.driver.left_bumper(),
            run_once("Seed Field Centric", &[DRIVETRAIN], |mechanisms: &mut Mechanisms| {
                mechanisms.drivetrain.seed_field_centric()
            }),
        );
        Ok(())
    }

    // Exactly one modifier (Back or Start) and one face button (X or Y) held.
    fn characterization_combo(&self, modifier: Trigger, button: Trigger) -> Trigger {
        let back = self.driver.back();
        let start = self.driver.start();
        let x = self.driver.x();
        let y = self.driver.y();
        let modifiers = back.and(start.negate()).or(start.and(back.negate()));
        let buttons = x.and(y.negate()).or(y.and(x.negate()));
        modifier.and(button).and(modifiers).and(buttons)
    }

    fn configure_elevator_bindings(&mut self, config: &RobotConfig) -> Result<(), SchedulerError> {
        let elevator = &config.elevator;
        let (min, max) = (elevator.min_position, elevator.max_position);

        self.scheduler.on_true(
            self.operator.pov_up(),
            run_once("Elevator To Max", &[ELEVATOR], move |mechanisms: &mut Mechanisms| {
                mechanisms.elevator.set_position(max)
            }),
        );
        self.scheduler.on_true(
            self.operator.pov_down(),
            run_once("Elevator To Min", &[ELEVATOR], move |mechanisms: &mut Mechanisms| {
                mechanisms.elevator.set_position(min)
            }),
        );
        self.scheduler.on_true(
            self.operator.left_trigger(),
            run_once("Reset Elevator Encoders", &[ELEVATOR], |mechanisms: &mut Mechanisms| {
                mechanisms.elevator.reset_encoders()
            })
            .ignoring_disable(true),
        );

        let operator = self.operator.clone();
        let threshold = elevator.manual_control_deadband;
        self.scheduler.set_default_command(
            ELEVATOR,
            run("Elevator Manual", &[ELEVATOR], move |mechanisms: &mut Mechanisms| {
                mechanisms
                    .elevator
                    .manual_control(deadband(-operator.left_y(), threshold))
            })
            .on_end(|mechanisms: &mut Mechanisms, _| mechanisms.elevator.manual_control(0.0)),
        )?;
        Ok(())
    }

    fn configure_coral_algae_bindings(&mut self, config: &RobotConfig) -> Result<(), SchedulerError> {
        let coral_algae = &config.coral_algae;
        let (min, max) = (coral_algae.pivot_min_angle, coral_algae.pivot_max_angle);

        self.scheduler.on_true(
            self.operator.y(),
            run_once("Pivot To Max", &[CORAL_ALGAE], move |mechanisms: &mut Mechanisms| {
                mechanisms.coral_algae.set_pivot_angle(max)
            }),
        );
        self.scheduler.on_true(
            self.operator.a(),
            run_once("Pivot To Min", &[CORAL_ALGAE], move |mechanisms: &mut Mechanisms| {
                mechanisms.coral_algae.set_pivot_angle(min)
            }),
        );
        self.scheduler.on_true(
            self.operator.right_trigger(),
            run_once("Reset Pivot Encoder", &[CORAL_ALGAE], |mechanisms: &mut Mechanisms| {
                mechanisms.coral_algae.reset_pivot_encoder()
            })
            .ignoring_disable(true),
        );

        for (trigger, name, mode) in [
            (self.operator.right_bumper(), "Intake Coral", IntakeMode::Coral),
            (self.operator.left_bumper(), "Intake Algae", IntakeMode::Algae),
            (self.operator.b(), "Stop Intake", IntakeMode::Stopped),
        ] {
            self.scheduler.on_true(
                trigger,
                run_once(name, &[CORAL_ALGAE], move |mechanisms: &mut Mechanisms| {
                    mechanisms.coral_algae.set_intake_mode(mode)
                }),
            );
        }

        let operator = self.operator.clone();
        let threshold = coral_algae.manual_control_deadband;
        self.scheduler.set_default_command(
            CORAL_ALGAE,
            run("Pivot Manual", &[CORAL_ALGAE], move |mechanisms: &mut Mechanisms| {
                mechanisms
                    .coral_algae
                    .manual_pivot_control(deadband(-operator.right_y(), threshold))
            })
            .on_end(|mechanisms: &mut Mechanisms, _| {
                mechanisms.coral_algae.manual_pivot_control(0.0)
            }),
        )?;
        Ok(())
    }

    /// Fresh instance of the routine selected on the dashboard, or the chooser default.
    pub fn autonomous_command(&self) -> Option<Box<dyn Command<Mechanisms>>> {
        self.auto_chooser.selected()
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn mechanisms(&self) -> &Mechanisms {
        &self.mechanisms
    }

    pub fn scheduler(&self) -> &CommandScheduler<Mechanisms> {
        &self.scheduler
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn max_angular_rate(&self) -> f64 {
        self.max_angular_rate
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.scheduler.set_enabled(&mut self.mechanisms, enabled);
    }

    /// One robot loop iteration.
    pub fn run(&mut self) {
        self.scheduler.run(&mut self.mechanisms);
    }

    /// Registers and schedules the selected autonomous routine, replacing any earlier one.
    pub fn start_autonomous(&mut self) -> Result<Option<CommandId>, SchedulerError> {
        self.stop_autonomous();
        let Some(command) = self.autonomous_command() else {
            warn!("No autonomous routine available");
            return Ok(None);
        };

        info!("Starting autonomous {}", command.name());
        let id = self.scheduler.register_boxed(command);
        self.autonomous = Some(id);
        self.scheduler.schedule(&mut self.mechanisms, id)?;
        Ok(Some(id))
    }

    /// Interrupts the autonomous routine if it is still running.
    pub fn stop_autonomous(&mut self) {
        if let Some(id) = self.autonomous.take() {
            if self.scheduler.is_scheduled(id) {
                info!("Cancelling autonomous");
            }
            self.scheduler.unregister(&mut self.mechanisms, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::event_collector::{AxisType, ButtonType};
    use crate::controller::ControllerState;
    use crate::subsystems::swerve::DrivePosture;
    use tokio::sync::watch;

    const PERIOD: Duration = Duration::from_millis(20);

    struct Bench {
        container: RobotContainer,
        driver: watch::Sender<ControllerState>,
        operator: watch::Sender<ControllerState>,
    }

    impl Bench {
        fn new() -> Self {
            Self::with_config(RobotConfig::default())
        }

        fn with_config(config: RobotConfig) -> Self {
            let (driver, driver_rx) = watch::channel(ControllerState::default());
            let (operator, operator_rx) = watch::channel(ControllerState::default());
            let container = RobotContainer::new(
                &config,
                XboxController::new(0, driver_rx, 0.5),
                XboxController::new(1, operator_rx, 0.5),
                PERIOD,
            )
            .unwrap();
            let mut bench = Self {
                container,
                driver,
                operator,
            };
            bench.container.set_enabled(true);
            bench.container.run();
            bench
        }

        fn driver_axis(&self, axis: AxisType, value: f64) {
            self.driver.send_modify(|state| state.set_axis(axis, value));
        }

        fn operator_axis(&self, axis: AxisType, value: f64) {
            self.operator.send_modify(|state| state.set_axis(axis, value));
        }

        fn driver_buttons(&self, buttons: &[ButtonType]) {
            self.driver
                .send_modify(|state| state.buttons = buttons.iter().copied().collect());
        }

        fn operator_buttons(&self, buttons: &[ButtonType]) {
            self.operator
                .send_modify(|state| state.buttons = buttons.iter().copied().collect());
        }

        fn request(&self) -> SwerveRequest {
            *self.container.mechanisms().drivetrain.request()
        }

        fn drive_command(&self) -> Option<&str> {
            let scheduler = self.container.scheduler();
            scheduler
                .requiring(DRIVETRAIN)
                .and_then(|id| scheduler.command_name(id))
        }
    }

    #[test]
    fn deadband_is_exclusive_at_threshold() {
        assert_eq!(deadband(0.05, 0.1), 0.0);
        assert_eq!(deadband(-0.099, 0.1), 0.0);
        assert_eq!(deadband(0.1, 0.1), 0.1);
        assert_eq!(deadband(-0.7, 0.1), -0.7);
    }

    #[test]
    fn derived_constants() {
        let bench = Bench::new();
        assert_eq!(bench.container.max_speed(), 4.73);
        assert!((bench.container.max_angular_rate() - 0.75 * TAU).abs() < 1e-12);
    }

    #[test]
    fn left_stick_forward_drives_at_max_speed() {
        let mut bench = Bench::new();
        bench.driver_axis(AxisType::LeftY, -1.0);
        bench.driver_axis(AxisType::RightX, 0.5);
        bench.container.run();

        let SwerveRequest::FieldCentric(request) = bench.request() else {
            panic!("expected field-centric drive, got {:?}", bench.request());
        };
        let max_speed = bench.container.max_speed();
        let max_angular_rate = bench.container.max_angular_rate();
        assert_eq!(request.velocity_x, max_speed);
        assert_eq!(request.velocity_y, 0.0);
        assert_eq!(request.rotational_rate, -0.5 * max_angular_rate);
        assert!((request.deadband - 0.2 * max_speed).abs() < 1e-12);
        assert!((request.rotational_deadband - 0.1 * max_angular_rate).abs() < 1e-12);
        assert_eq!(request.drive_request_type, DriveRequestType::OpenLoopVoltage);
    }

    #[test]
    fn brake_while_held_then_default_returns() {
        let mut bench = Bench::new();
        bench.driver_buttons(&[ButtonType::A]);
        bench.container.run();
        assert_eq!(bench.request(), SwerveRequest::Brake);
        assert_eq!(bench.drive_command(), Some("Brake"));

        bench.container.run();
        assert_eq!(
            bench.container.mechanisms().drivetrain.state().posture,
            DrivePosture::Braked
        );

        bench.driver_buttons(&[]);
        bench.container.run();
        assert_eq!(bench.drive_command(), Some("Field Centric Drive"));
        bench.container.run();
        assert!(matches!(bench.request(), SwerveRequest::FieldCentric(_)));
    }

    #[test]
    fn b_points_wheels_along_left_stick() {
        let mut bench = Bench::new();
        bench.driver_axis(AxisType::LeftX, -1.0);
        bench.driver_buttons(&[ButtonType::B]);
        bench.container.run();

        let SwerveRequest::PointWheelsAt(direction) = bench.request() else {
            panic!("expected point wheels, got {:?}", bench.request());
        };
        assert!((direction.degrees() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn pov_nudges_robot_centric() {
        let mut bench = Bench::new();
        bench.driver_buttons(&[ButtonType::DPadUp]);
        bench.container.run();
        assert_eq!(
            bench.request(),
            SwerveRequest::RobotCentric(RobotCentric::default().with_velocity_x(0.5))
        );

        bench.driver_buttons(&[ButtonType::DPadDown]);
        bench.container.run();
        assert_eq!(
            bench.request(),
            SwerveRequest::RobotCentric(RobotCentric::default().with_velocity_x(-0.5))
        );
    }

    #[test]
    fn characterization_combos_are_exclusive() {
        let mut bench = Bench::new();
        bench.driver_buttons(&[ButtonType::Back, ButtonType::Y]);
        bench.container.run();
        assert_eq!(bench.drive_command(), Some("SysId Dynamic Forward"));

        bench.driver_buttons(&[ButtonType::Back, ButtonType::Y, ButtonType::Start]);
        bench.container.run();
        assert_eq!(bench.drive_command(), Some("Field Centric Drive"));

        bench.driver_buttons(&[ButtonType::Start, ButtonType::X, ButtonType::Y]);
        bench.container.run();
        assert_eq!(bench.drive_command(), Some("Field Centric Drive"));

        bench.driver_buttons(&[ButtonType::Start, ButtonType::X]);
        bench.container.run();
        assert_eq!(bench.drive_command(), Some("SysId Quasistatic Reverse"));
    }

    #[test]
    fn left_bumper_seeds_field_centric() {
        let mut bench = Bench::new();
        bench.driver_axis(AxisType::RightX, -1.0);
        for _ in 0..10 {
            bench.container.run();
        }
        assert_eq!(
            bench.container.mechanisms().drivetrain.operator_forward(),
            Rotation2d::ZERO
        );

        bench.driver_axis(AxisType::RightX, 0.0);
        bench.driver_buttons(&[ButtonType::LeftBumper]);
        bench.container.run();
        let drivetrain = &bench.container.mechanisms().drivetrain;
        let heading = drivetrain.state().pose.heading;
        assert!(heading.degrees().abs() > 1.0);
        assert_eq!(drivetrain.operator_forward(), heading);
    }

    #[test]
    fn elevator_preset_survives_neutral_stick() {
        let mut bench = Bench::new();
        bench.operator_buttons(&[ButtonType::DPadUp]);
        bench.container.run();
        let max = RobotConfig::default().elevator.max_position;
        assert_eq!(bench.container.mechanisms().elevator.target(), Some(max));

        bench.operator_buttons(&[]);
        bench.operator_axis(AxisType::LeftY, -0.05);
        for _ in 0..5 {
            bench.container.run();
        }
        assert_eq!(bench.container.mechanisms().elevator.target(), Some(max));
        assert!(bench.container.mechanisms().elevator.position() > 0.0);

        bench.operator_axis(AxisType::LeftY, -0.5);
        bench.container.run();
        assert_eq!(bench.container.mechanisms().elevator.target(), None);
    }

    #[test]
    fn encoder_resets_run_while_disabled() {
        let mut bench = Bench::new();
        bench.operator_axis(AxisType::LeftY, -1.0);
        for _ in 0..5 {
            bench.container.run();
        }
        assert!(bench.container.mechanisms().elevator.position() > 0.0);

        bench.container.set_enabled(false);
        bench.operator_axis(AxisType::LeftY, 0.0);
        bench.operator_axis(AxisType::LeftTrigger, 0.8);
        bench.operator_buttons(&[ButtonType::Y]);
        bench.container.run();

        let mechanisms = bench.container.mechanisms();
        assert_eq!(mechanisms.elevator.position(), 0.0);
        assert_eq!(mechanisms.coral_algae.pivot_target(), None, "pivot preset needs enable");
    }

    #[test]
    fn disabling_stops_every_mechanism() {
        let mut bench = Bench::new();
        bench.driver_axis(AxisType::LeftY, -1.0);
        bench.operator_buttons(&[ButtonType::DPadUp]);
        bench.container.run();
        bench.container.run();

        let pose = bench.container.mechanisms().drivetrain.state().pose;
        let elevator = bench.container.mechanisms().elevator.position();
        assert!(pose.x > 0.0);

        bench.container.set_enabled(false);
        for _ in 0..50 {
            bench.container.run();
        }

        let mechanisms = bench.container.mechanisms();
        assert_eq!(mechanisms.drivetrain.state().pose, pose);
        assert_eq!(mechanisms.drivetrain.state().speeds.vx, 0.0);
        assert_eq!(mechanisms.drivetrain.request(), &SwerveRequest::Idle);
        assert_eq!(mechanisms.elevator.position(), elevator);
        assert_eq!(mechanisms.elevator.output(), 0.0);
    }

    #[test]
    fn pov_down_sends_elevator_to_min() {
        let mut bench = Bench::new();
        bench.operator_buttons(&[ButtonType::DPadDown]);
        bench.container.run();

        let min = RobotConfig::default().elevator.min_position;
        assert_eq!(bench.container.mechanisms().elevator.target(), Some(min));
    }

    #[test]
    fn right_trigger_resets_pivot_while_disabled() {
        let mut bench = Bench::new();
        bench.operator_axis(AxisType::RightY, -1.0);
        for _ in 0..5 {
            bench.container.run();
        }
        assert!(bench.container.mechanisms().coral_algae.pivot_angle() > 0.0);

        bench.container.set_enabled(false);
        bench.operator_axis(AxisType::RightY, 0.0);
        bench.operator_axis(AxisType::RightTrigger, 0.8);
        bench.container.run();

        assert_eq!(bench.container.mechanisms().coral_algae.pivot_angle(), 0.0);
    }

    #[test]
    fn pivot_manual_default_is_inverted_and_deadbanded() {
        let mut bench = Bench::new();
        bench.operator_axis(AxisType::RightY, -0.5);
        bench.container.run();
        bench.container.run();
        assert_eq!(bench.container.mechanisms().coral_algae.pivot_output(), 0.5);

        bench.operator_axis(AxisType::RightY, -0.05);
        bench.container.run();
        bench.container.run();
        assert_eq!(bench.container.mechanisms().coral_algae.pivot_output(), 0.0);
    }

    #[test]
    fn operator_sets_intake_modes() {
        let mut bench = Bench::new();
        bench.operator_buttons(&[ButtonType::RightBumper]);
        bench.container.run();
        assert_eq!(
            bench.container.mechanisms().coral_algae.intake_mode(),
            IntakeMode::Coral
        );

        bench.operator_buttons(&[ButtonType::LeftBumper]);
        bench.container.run();
        assert_eq!(
            bench.container.mechanisms().coral_algae.intake_mode(),
            IntakeMode::Algae
        );

        bench.operator_buttons(&[ButtonType::B]);
        bench.container.run();
        assert_eq!(
            bench.container.mechanisms().coral_algae.intake_mode(),
            IntakeMode::Stopped
        );
    }

    #[test]
    fn pivot_presets_on_face_buttons() {
        let mut bench = Bench::new();
        bench.operator_buttons(&[ButtonType::Y]);
        bench.container.run();
        assert_eq!(bench.container.mechanisms().coral_algae.pivot_target(), Some(90.0));

        bench.operator_buttons(&[ButtonType::A]);
        bench.container.run();
        assert_eq!(bench.container.mechanisms().coral_algae.pivot_target(), Some(0.0));
    }

    #[test]
    fn autonomous_follows_dashboard_selection() {
        let mut bench = Bench::new();
        assert_eq!(
            bench.container.autonomous_command().unwrap().name(),
            "Example Auto"
        );

        assert!(bench.container.dashboard().select(AUTO_MODE_KEY, "None"));
        assert_eq!(bench.container.autonomous_command().unwrap().name(), "None");

        bench.container.dashboard().select(AUTO_MODE_KEY, "Example Auto");
        let id = bench.container.start_autonomous().unwrap().unwrap();
        assert!(bench.container.scheduler().is_scheduled(id));
        assert_eq!(bench.drive_command(), Some("Example Auto"));

        bench.container.stop_autonomous();
        assert!(!bench.container.scheduler().is_scheduled(id));
        bench.container.run();
        assert_eq!(bench.drive_command(), Some("Field Centric Drive"));
    }
}
