//! Robot mechanisms
//!
//! [`Mechanisms`] owns every subsystem for the life of the process and is the context the
//! command scheduler hands to commands.

pub mod coral_algae;
pub mod drivetrain;
pub mod elevator;
pub mod servo;
pub mod swerve;

use std::time::Duration;

use crate::command::{Periodic, SubsystemId};
use crate::config::RobotConfig;
use coral_algae::CoralAlgae;
use drivetrain::SwerveDrivetrain;
use elevator::Elevator;

pub const DRIVETRAIN: SubsystemId = SubsystemId("drivetrain");
pub const ELEVATOR: SubsystemId = SubsystemId("elevator");
pub const CORAL_ALGAE: SubsystemId = SubsystemId("coral_algae");

pub struct Mechanisms {
    pub drivetrain: SwerveDrivetrain,
    pub elevator: Elevator,
    pub coral_algae: CoralAlgae,
}

impl Mechanisms {
    pub const ALL: [SubsystemId; 3] = [DRIVETRAIN, ELEVATOR, CORAL_ALGAE];

    pub fn new(config: &RobotConfig, period: Duration) -> Self {
        Self {
            drivetrain: SwerveDrivetrain::new(config.drive.speed_at_12_volts, period),
            elevator: Elevator::new(&config.elevator, period),
            coral_algae: CoralAlgae::new(&config.coral_algae, period),
        }
    }
}

impl Periodic for Mechanisms {
    fn periodic(&mut self, enabled: bool) {
        self.drivetrain.periodic(enabled);
        self.elevator.periodic(enabled);
        self.coral_algae.periodic(enabled);
    }
}
