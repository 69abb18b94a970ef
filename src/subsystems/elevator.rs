use std::time::Duration;

use super::servo::ServoAxis;
use crate::config::ElevatorConfig;

pub struct Elevator {
    carriage: ServoAxis,
}

impl Elevator {
    pub fn new(config: &ElevatorConfig, period: Duration) -> Self {
        Self {
            carriage: ServoAxis::new(
                "elevator",
                config.min_position,
                config.max_position,
                config.max_speed,
                config.kp,
                period,
            ),
        }
    }

    pub fn set_position(&mut self, position: f64) {
        self.carriage.set_target(position);
    }

    /// Open-loop carriage speed in [-1, 1]. Zero keeps holding a preset position.
    pub fn manual_control(&mut self, speed: f64) {
        self.carriage.set_manual(speed);
    }

    pub fn reset_encoders(&mut self) {
        self.carriage.reset_encoder();
    }

    pub fn position(&self) -> f64 {
        self.carriage.position()
    }

    pub fn target(&self) -> Option<f64> {
        self.carriage.target()
    }

    pub fn output(&self) -> f64 {
        self.carriage.output()
    }

    pub fn periodic(&mut self, enabled: bool) {
        self.carriage.periodic(enabled);
    }
}
