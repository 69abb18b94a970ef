use std::time::Duration;
use tracing::info;

use super::servo::ServoAxis;
use crate::config::CoralAlgaeConfig;

/// Game piece the intake rollers are set up for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntakeMode {
    #[default]
    Stopped,
    Coral,
    Algae,
}

/// Combined intake rollers and the pivot they are mounted on.
pub struct CoralAlgae {
    pivot: ServoAxis,
    intake_mode: IntakeMode,
    roller_output: f64,
    coral_intake_speed: f64,
    algae_intake_speed: f64,
}

impl CoralAlgae {
    pub fn new(config: &CoralAlgaeConfig, period: Duration) -> Self {
        Self {
            pivot: ServoAxis::new(
                "pivot",
                config.pivot_min_angle,
                config.pivot_max_angle,
                config.pivot_max_speed,
                config.pivot_kp,
                period,
            ),
            intake_mode: IntakeMode::Stopped,
            roller_output: 0.0,
            coral_intake_speed: config.coral_intake_speed,
            algae_intake_speed: config.algae_intake_speed,
        }
    }

    /// Angle in degrees.
    pub fn set_pivot_angle(&mut self, angle: f64) {
        self.pivot.set_target(angle);
    }

    pub fn manual_pivot_control(&mut self, speed: f64) {
        self.pivot.set_manual(speed);
    }

    pub fn reset_pivot_encoder(&mut self) {
        self.pivot.reset_encoder();
    }

    pub fn set_intake_mode(&mut self, mode: IntakeMode) {
        self.roller_output = match mode {
            IntakeMode::Stopped => 0.0,
            IntakeMode::Coral => self.coral_intake_speed,
            IntakeMode::Algae => self.algae_intake_speed,
        };
        if mode != self.intake_mode {
            info!("Intake mode {:?} -> {:?}", self.intake_mode, mode);
        }
        self.intake_mode = mode;
    }

    pub fn stop_intake(&mut self) {
        self.set_intake_mode(IntakeMode::Stopped);
    }

    pub fn intake_mode(&self) -> IntakeMode {
        self.intake_mode
    }

    pub fn roller_output(&self) -> f64 {
        self.roller_output
    }

    pub fn pivot_angle(&self) -> f64 {
        self.pivot.position()
    }

    pub fn pivot_target(&self) -> Option<f64> {
        self.pivot.target()
    }

    pub fn pivot_output(&self) -> f64 {
        self.pivot.output()
    }

    pub fn periodic(&mut self, enabled: bool) {
        self.pivot.periodic(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_modes_drive_rollers() {
        let config = CoralAlgaeConfig::default();
        let mut mechanism = CoralAlgae::new(&config, Duration::from_millis(20));

        mechanism.set_intake_mode(IntakeMode::Coral);
        assert_eq!(mechanism.roller_output(), config.coral_intake_speed);

        mechanism.set_intake_mode(IntakeMode::Algae);
        assert_eq!(mechanism.roller_output(), config.algae_intake_speed);

        mechanism.stop_intake();
        assert_eq!(mechanism.intake_mode(), IntakeMode::Stopped);
        assert_eq!(mechanism.roller_output(), 0.0);
    }
}
