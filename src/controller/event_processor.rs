use chrono::{DateTime, Local};
use statum::{machine, state};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::controller::event_collector::{AxisType, ButtonState, ButtonType, RawControllerEvent};

/// Latest known input of one gamepad port.
///
/// A port without a gamepad, or whose gamepad disconnected, reads neutral.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControllerState {
    pub connected: bool,
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
    pub right_y: f64,
    pub left_trigger: f64,
    pub right_trigger: f64,
    pub buttons: HashSet<ButtonType>,
    pub timestamp: Option<DateTime<Local>>,
}

impl ControllerState {
    pub fn axis(&self, axis: AxisType) -> f64 {
        match axis {
            AxisType::LeftX => self.left_x,
            AxisType::LeftY => self.left_y,
            AxisType::RightX => self.right_x,
            AxisType::RightY => self.right_y,
            AxisType::LeftTrigger => self.left_trigger,
            AxisType::RightTrigger => self.right_trigger,
        }
    }

    pub fn set_axis(&mut self, axis: AxisType, value: f64) {
        let value = value.clamp(-1.0, 1.0);
        match axis {
            AxisType::LeftX => self.left_x = value,
            AxisType::LeftY => self.left_y = value,
            AxisType::RightX => self.right_x = value,
            AxisType::RightY => self.right_y = value,
            AxisType::LeftTrigger => self.left_trigger = value,
            AxisType::RightTrigger => self.right_trigger = value,
        }
    }

    pub fn is_pressed(&self, button: ButtonType) -> bool {
        self.buttons.contains(&button)
    }

    /// D-pad direction in degrees clockwise from up, `None` when centered.
    pub fn pov(&self) -> Option<u16> {
        let horizontal = i8::from(self.is_pressed(ButtonType::DPadRight))
            - i8::from(self.is_pressed(ButtonType::DPadLeft));
        let vertical = i8::from(self.is_pressed(ButtonType::DPadUp))
            - i8::from(self.is_pressed(ButtonType::DPadDown));

        match (horizontal, vertical) {
            (0, 1) => Some(0),
            (1, 1) => Some(45),
            (1, 0) => Some(90),
            (1, -1) => Some(135),
            (0, -1) => Some(180),
            (-1, -1) => Some(225),
            (-1, 0) => Some(270),
            (-1, 1) => Some(315),
            _ => None,
        }
    }

    pub fn apply(&mut self, event: &RawControllerEvent) {
        match event {
            RawControllerEvent::AxisMove {
                axis,
                value,
                timestamp,
                ..
            } => {
                self.set_axis(*axis, *value);
                self.timestamp = Some(*timestamp);
            }
            RawControllerEvent::ButtonEvent {
                button_type,
                button_state,
                timestamp,
                ..
            } => {
                match button_state {
                    ButtonState::Pressed => self.buttons.insert(*button_type),
                    ButtonState::Released => self.buttons.remove(button_type),
                };
                self.timestamp = Some(*timestamp);
            }
            RawControllerEvent::Connection {
                connected,
                timestamp,
                ..
            } => {
                *self = ControllerState {
                    connected: *connected,
                    timestamp: Some(*timestamp),
                    ..Default::default()
                };
            }
        }
    }
}

// Event batch for the processing state
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub events: Vec<RawControllerEvent>,
}

#[derive(Clone, Debug)]
pub struct ProcessorSettings {
    pub processing_interval_ms: u64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            processing_interval_ms: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to receive events: {0}")]
    EventReceiveError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum ProcessingState {
    Waiting,
    Processing(EventBatch),
    Updating,
}

#[machine]
#[derive(Debug)]
pub struct EventProcessor<S: ProcessingState> {
    event_receiver: mpsc::Receiver<RawControllerEvent>,

    settings: ProcessorSettings,

    // One state and one watch sender per port
    states: Vec<ControllerState>,
    state_senders: Vec<watch::Sender<ControllerState>>,
}

impl<S: ProcessingState> EventProcessor<S> {
    pub fn subscribe(&self, port: usize) -> Option<watch::Receiver<ControllerState>> {
        self.state_senders.get(port).map(|sender| sender.subscribe())
    }
}

impl EventProcessor<Waiting> {
    pub fn create(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        ports: usize,
        settings: Option<ProcessorSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        info!(
            "Creating Event Processor for {} ports with settings: {:?}",
            ports, settings
        );

        let states = vec![ControllerState::default(); ports];
        let state_senders = (0..ports)
            .map(|_| watch::channel(ControllerState::default()).0)
            .collect();

        Self::new(event_receiver, settings, states, state_senders)
    }

    // Drain everything queued since the last cycle without blocking
    pub fn wait_and_collect(mut self) -> Result<EventProcessor<Processing>, ProcessorError> {
        let mut events = Vec::new();

        loop {
            match self.event_receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !events.is_empty() {
                        break;
                    }
                    return Err(ProcessorError::EventReceiveError(
                        "Event channel disconnected".to_string(),
                    ));
                }
            }
        }

        if !events.is_empty() {
            debug!("Collected batch of {} events for processing", events.len());
        }

        Ok(self.transition_with(EventBatch { events }))
    }
}

impl EventProcessor<Processing> {
    pub fn process_events(mut self) -> EventProcessor<Updating> {
        let events = self
            .get_state_data()
            .map(|batch| batch.events.clone())
            .unwrap_or_default();

        for event in &events {
            match self.states.get_mut(event.port()) {
                Some(state) => state.apply(event),
                None => debug!("Ignoring event for unknown port {}", event.port()),
            }
        }

        self.transition()
    }
}

impl EventProcessor<Updating> {
    // Publish only ports whose state actually changed
    pub fn publish(self) -> EventProcessor<Waiting> {
        for (state, sender) in self.states.iter().zip(&self.state_senders) {
            sender.send_if_modified(|current| {
                if current != state {
                    *current = state.clone();
                    true
                } else {
                    false
                }
            });
        }

        self.transition()
    }
}

pub struct ProcessorHandle {
    state_receivers: Vec<watch::Receiver<ControllerState>>,
    task_handle: JoinHandle<()>,
}

impl ProcessorHandle {
    pub fn spawn(
        event_receiver: mpsc::Receiver<RawControllerEvent>,
        ports: usize,
        settings: Option<ProcessorSettings>,
        shutdown: CancellationToken,
    ) -> Self {
        let processor = EventProcessor::create(event_receiver, ports, settings);
        let state_receivers = (0..ports)
            .filter_map(|port| processor.subscribe(port))
            .collect();
        let period = Duration::from_millis(processor.settings.processing_interval_ms.max(1));

        let task_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut processor = processor;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Event Processor shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        processor = match processor.wait_and_collect() {
                            Ok(processing) => processing.process_events().publish(),
                            Err(e) => {
                                error!("Event Processor stopped: {}", e);
                                break;
                            }
                        };
                    }
                }
            }
        });

        Self {
            state_receivers,
            task_handle,
        }
    }

    pub fn subscribe(&self, port: usize) -> Option<watch::Receiver<ControllerState>> {
        self.state_receivers.get(port).cloned()
    }

    pub fn abort(&self) {
        self.task_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(port: usize, button_type: ButtonType, button_state: ButtonState) -> RawControllerEvent {
        RawControllerEvent::ButtonEvent {
            port,
            button_type,
            button_state,
            timestamp: Local::now(),
        }
    }

    fn axis(port: usize, axis: AxisType, value: f64) -> RawControllerEvent {
        RawControllerEvent::AxisMove {
            port,
            axis,
            value,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn pov_combines_dpad_buttons() {
        let mut state = ControllerState::default();
        assert_eq!(state.pov(), None);

        state.apply(&button(0, ButtonType::DPadUp, ButtonState::Pressed));
        assert_eq!(state.pov(), Some(0));

        state.apply(&button(0, ButtonType::DPadRight, ButtonState::Pressed));
        assert_eq!(state.pov(), Some(45));

        state.apply(&button(0, ButtonType::DPadUp, ButtonState::Released));
        state.apply(&button(0, ButtonType::DPadRight, ButtonState::Released));
        state.apply(&button(0, ButtonType::DPadDown, ButtonState::Pressed));
        assert_eq!(state.pov(), Some(180));

        state.apply(&button(0, ButtonType::DPadUp, ButtonState::Pressed));
        assert_eq!(state.pov(), None);
    }

    #[test]
    fn disconnect_resets_to_neutral() {
        let mut state = ControllerState::default();
        state.apply(&axis(0, AxisType::LeftY, -0.8));
        state.apply(&button(0, ButtonType::A, ButtonState::Pressed));

        state.apply(&RawControllerEvent::Connection {
            port: 0,
            connected: false,
            timestamp: Local::now(),
        });

        assert_eq!(state.left_y, 0.0);
        assert!(!state.is_pressed(ButtonType::A));
        assert!(!state.connected);
    }

    #[test]
    fn axis_values_are_clamped() {
        let mut state = ControllerState::default();
        state.apply(&axis(0, AxisType::RightX, 1.7));
        assert_eq!(state.axis(AxisType::RightX), 1.0);
    }

    #[tokio::test]
    async fn processor_publishes_per_port() {
        let (tx, rx) = mpsc::channel(16);
        let processor = EventProcessor::create(rx, 2, None);
        let mut driver = processor.subscribe(0).unwrap();
        let operator = processor.subscribe(1).unwrap();

        tx.send(axis(0, AxisType::LeftY, -1.0)).await.unwrap();
        tx.send(button(0, ButtonType::B, ButtonState::Pressed)).await.unwrap();
        tx.send(axis(5, AxisType::LeftY, 1.0)).await.unwrap();

        let _waiting = processor
            .wait_and_collect()
            .unwrap()
            .process_events()
            .publish();

        assert!(driver.has_changed().unwrap());
        let state = driver.borrow_and_update().clone();
        assert_eq!(state.left_y, -1.0);
        assert!(state.is_pressed(ButtonType::B));
        assert_eq!(operator.borrow().left_y, 0.0);
    }

    #[tokio::test]
    async fn closed_channel_with_no_events_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let processor = EventProcessor::create(rx, 1, None);
        assert!(processor.wait_and_collect().is_err());
    }
}
