use std::time::Duration;
use tracing::{debug, info};

/// One simulated position-controlled axis (elevator carriage, pivot joint).
///
/// Either holds a closed-loop target or applies a manual output in [-1, 1]. A non-zero manual
/// output drops the target; a zero manual output leaves an active target in place so a joystick
/// at rest does not cancel a preset. Soft limits stop outward motion at the min/max positions.
#[derive(Clone, Debug)]
pub struct ServoAxis {
    name: &'static str,
    travel: f64,
    zero: f64,
    min: f64,
    max: f64,
    max_speed: f64,
    kp: f64,
    target: Option<f64>,
    manual: f64,
    output: f64,
    period: Duration,
}

impl ServoAxis {
    pub fn new(
        name: &'static str,
        min: f64,
        max: f64,
        max_speed: f64,
        kp: f64,
        period: Duration,
    ) -> Self {
        Self {
            name,
            travel: min,
            zero: 0.0,
            min,
            max,
            max_speed,
            kp,
            target: None,
            manual: 0.0,
            output: 0.0,
            period,
        }
    }

    /// Encoder reading relative to the last reset.
    pub fn position(&self) -> f64 {
        self.travel - self.zero
    }

    pub fn target(&self) -> Option<f64> {
        self.target
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn set_target(&mut self, target: f64) {
        let target = target.clamp(self.min, self.max);
        debug!("{} target {:.3}", self.name, target);
        self.target = Some(target);
    }

    pub fn set_manual(&mut self, speed: f64) {
        let speed = speed.clamp(-1.0, 1.0);
        if speed != 0.0 && self.target.take().is_some() {
            debug!("{} manual override drops target", self.name);
        }
        self.manual = speed;
    }

    /// Declares the current position to be zero.
    pub fn reset_encoder(&mut self) {
        self.zero = self.travel;
        self.target = None;
        self.manual = 0.0;
        info!("{} encoder reset", self.name);
    }

    /// A disabled axis outputs nothing but keeps its target for when it is enabled again.
    pub fn periodic(&mut self, enabled: bool) {
        let position = self.position();
        let mut output = match self.target {
            _ if !enabled => 0.0,
            Some(target) => (self.kp * (target - position)).clamp(-1.0, 1.0),
            None => self.manual,
        };

        if (position >= self.max && output > 0.0) || (position <= self.min && output < 0.0) {
            output = 0.0;
        }

        self.output = output;
        self.travel += output * self.max_speed * self.period.as_secs_f64();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> ServoAxis {
        ServoAxis::new("test", 0.0, 1.0, 1.0, 5.0, Duration::from_millis(20))
    }

    #[test]
    fn converges_on_target() {
        let mut axis = axis();
        axis.set_target(0.5);
        for _ in 0..200 {
            axis.set_manual(0.0);
            axis.periodic(true);
        }
        assert!((axis.position() - 0.5).abs() < 1e-3);
        assert_eq!(axis.target(), Some(0.5));
    }

    #[test]
    fn manual_motion_overrides_target_and_respects_limits() {
        let mut axis = axis();
        axis.set_target(0.8);
        axis.set_manual(-0.5);
        assert_eq!(axis.target(), None);

        axis.periodic(true);
        assert_eq!(axis.output(), 0.0, "already at the lower limit");

        axis.set_manual(1.0);
        for _ in 0..100 {
            axis.periodic(true);
        }
        assert!(axis.position() < 1.03);
        assert_eq!(axis.output(), 0.0);
    }

    #[test]
    fn disabled_axis_holds_still() {
        let mut axis = axis();
        axis.set_target(0.8);
        for _ in 0..10 {
            axis.periodic(false);
        }
        assert_eq!(axis.position(), 0.0);
        assert_eq!(axis.output(), 0.0);
        assert_eq!(axis.target(), Some(0.8));

        axis.periodic(true);
        assert!(axis.output() > 0.0);
    }

    #[test]
    fn targets_are_clamped_and_reset_rezeroes() {
        let mut axis = axis();
        axis.set_target(4.0);
        assert_eq!(axis.target(), Some(1.0));

        axis.set_manual(1.0);
        for _ in 0..10 {
            axis.periodic(true);
        }
        assert!(axis.position() > 0.1);

        axis.reset_encoder();
        assert_eq!(axis.position(), 0.0);
        assert_eq!(axis.target(), None);
    }
}
