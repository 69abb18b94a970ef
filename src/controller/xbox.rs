use tokio::sync::watch;

use crate::command::trigger::Trigger;
use crate::controller::event_collector::{AxisType, ButtonType};
use crate::controller::event_processor::ControllerState;

/// Xbox-style gamepad on one port.
///
/// Axis getters read the latest published snapshot; the button methods build [`Trigger`]s that
/// re-read the snapshot every time they are polled.
#[derive(Clone, Debug)]
pub struct XboxController {
    port: usize,
    state: watch::Receiver<ControllerState>,
    trigger_threshold: f64,
}

impl XboxController {
    pub fn new(port: usize, state: watch::Receiver<ControllerState>, trigger_threshold: f64) -> Self {
        Self {
            port,
            state,
            trigger_threshold,
        }
    }

    pub fn port(&self) -> usize {
        self.port
    }

    pub fn axis(&self, axis: AxisType) -> f64 {
        self.state.borrow().axis(axis)
    }

    pub fn left_x(&self) -> f64 {
        self.axis(AxisType::LeftX)
    }

    pub fn left_y(&self) -> f64 {
        self.axis(AxisType::LeftY)
    }

    pub fn right_x(&self) -> f64 {
        self.axis(AxisType::RightX)
    }

    pub fn right_y(&self) -> f64 {
        self.axis(AxisType::RightY)
    }

    pub fn button(&self, button: ButtonType) -> Trigger {
        let state = self.state.clone();
        Trigger::new(move || state.borrow().is_pressed(button))
    }

    pub fn a(&self) -> Trigger {
        self.button(ButtonType::A)
    }

    pub fn b(&self) -> Trigger {
        self.button(ButtonType::B)
    }

    pub fn x(&self) -> Trigger {
        self.button(ButtonType::X)
    }

    pub fn y(&self) -> Trigger {
        self.button(ButtonType::Y)
    }

    pub fn back(&self) -> Trigger {
        self.button(ButtonType::Back)
    }

    pub fn start(&self) -> Trigger {
        self.button(ButtonType::Start)
    }

    pub fn left_bumper(&self) -> Trigger {
        self.button(ButtonType::LeftBumper)
    }

    pub fn right_bumper(&self) -> Trigger {
        self.button(ButtonType::RightBumper)
    }

    /// Active while the D-pad points exactly at `angle` degrees.
    pub fn pov(&self, angle: u16) -> Trigger {
        let state = self.state.clone();
        Trigger::new(move || state.borrow().pov() == Some(angle))
    }

    pub fn pov_up(&self) -> Trigger {
        self.pov(0)
    }

    pub fn pov_down(&self) -> Trigger {
        self.pov(180)
    }

    /// Active while the analog trigger is pressed past the threshold.
    pub fn left_trigger(&self) -> Trigger {
        self.axis_above(AxisType::LeftTrigger)
    }

    pub fn right_trigger(&self) -> Trigger {
        self.axis_above(AxisType::RightTrigger)
    }

    fn axis_above(&self, axis: AxisType) -> Trigger {
        let state = self.state.clone();
        let threshold = self.trigger_threshold;
        Trigger::new(move || state.borrow().axis(axis) > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_follow_published_state() {
        let (tx, rx) = watch::channel(ControllerState::default());
        let pad = XboxController::new(0, rx, 0.5);
        let a = pad.a();
        let up = pad.pov_up();
        let lt = pad.left_trigger();

        assert!(!a.get() && !up.get() && !lt.get());

        tx.send_modify(|state| {
            state.buttons.insert(ButtonType::A);
            state.buttons.insert(ButtonType::DPadUp);
            state.left_trigger = 0.5;
            state.left_y = -0.3;
        });

        assert!(a.get());
        assert!(up.get());
        assert!(!lt.get(), "threshold itself does not count as pressed");
        assert_eq!(pad.left_y(), -0.3);

        tx.send_modify(|state| state.left_trigger = 0.51);
        assert!(lt.get());
    }
}
