use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::collections::HashMap;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Raw controller event tagged with the port the gamepad is assigned to
#[derive(Debug, Clone)]
pub enum RawControllerEvent {
    AxisMove {
        port: usize,
        axis: AxisType,
        value: f64,
        timestamp: DateTime<Local>,
    },
    ButtonEvent {
        port: usize,
        button_type: ButtonType,
        button_state: ButtonState,
        timestamp: DateTime<Local>,
    },
    Connection {
        port: usize,
        connected: bool,
        timestamp: DateTime<Local>,
    },
}

impl RawControllerEvent {
    pub fn port(&self) -> usize {
        match self {
            RawControllerEvent::AxisMove { port, .. }
            | RawControllerEvent::ButtonEvent { port, .. }
            | RawControllerEvent::Connection { port, .. } => *port,
        }
    }
}

// Analog inputs of an Xbox-style pad. Stick Y axes use the HID convention (up is negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisType {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonType {
    A,
    B,
    X,
    Y,
    Back,
    Start,
    LeftBumper,
    RightBumper,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    /// Number of ports handed out to gamepads, in connection order
    pub ports: usize,
    pub poll_sleep: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            ports: 2,
            poll_sleep: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,

    settings: CollectorSettings,

    // Gamepad -> port assignment
    ports: HashMap<GamepadId, usize>,

    event_sender: mpsc::Sender<RawControllerEvent>,
}

impl<S: CollectionState> EventCollector<S> {
    // Lowest port not yet taken, if any remain
    fn free_port(&self) -> Option<usize> {
        (0..self.settings.ports).find(|port| !self.ports.values().any(|p| p == port))
    }

    fn send(&self, event: RawControllerEvent) {
        if let Err(e) = self.event_sender.try_send(event) {
            warn!("Dropped controller event: {}", e);
        }
    }
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawControllerEvent>,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Event Collector with settings: {:?}", settings);

        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, settings, HashMap::new(), event_sender))
    }

    // Assign already connected gamepads to ports and start collecting
    pub fn initialize(mut self) -> EventCollector<Collecting> {
        let connected: Vec<(GamepadId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect();

        if connected.is_empty() {
            warn!("No gamepad connected, all ports read neutral until one appears");
        }

        for (id, name) in connected {
            match self.free_port() {
                Some(port) => {
                    info!("Assigned gamepad {} ({}) to port {}", name, id, port);
                    self.ports.insert(id, port);
                    self.send(RawControllerEvent::Connection {
                        port,
                        connected: true,
                        timestamp: Local::now(),
                    });
                }
                None => warn!("No free port for gamepad {} ({})", name, id),
            }
        }

        info!("Event Collector initialized, transitioning to Collecting state");
        self.transition()
    }
}

impl EventCollector<Collecting> {
    pub fn collect_next_event(&mut self) -> Result<(), CollectorError> {
        if let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            if let Some(raw_event) = self.convert_gilrs_event(id, event) {
                if let RawControllerEvent::ButtonEvent {
                    port,
                    button_type,
                    button_state,
                    timestamp,
                } = &raw_event
                {
                    debug!(
                        "Port {} button {:?} {:?} at {}",
                        port,
                        button_type,
                        button_state,
                        timestamp.format("%H:%M:%S.%3f")
                    );
                }

                self.event_sender
                    .try_send(raw_event)
                    .map_err(|e| CollectorError::EventSendError(e.to_string()))?;
            }
        }
        Ok(())
    }

    pub fn run_collection_loop(&mut self, shutdown: CancellationToken) {
        info!("Starting Event Collector loop");

        while !shutdown.is_cancelled() {
            if let Err(e) = self.collect_next_event() {
                warn!("Error collecting event: {}", e);
            }
            std::thread::sleep(self.settings.poll_sleep);
        }

        info!("Event Collector loop stopped");
    }

    fn convert_gilrs_event(&mut self, id: GamepadId, event: EventType) -> Option<RawControllerEvent> {
        let now = Local::now();

        match event {
            EventType::Connected => {
                let port = match self.ports.get(&id) {
                    Some(port) => *port,
                    None => self.free_port()?,
                };
                info!("Gamepad {} connected on port {}", id, port);
                self.ports.insert(id, port);
                Some(RawControllerEvent::Connection {
                    port,
                    connected: true,
                    timestamp: now,
                })
            }
            EventType::Disconnected => {
                let port = self.ports.remove(&id)?;
                warn!("Gamepad {} on port {} disconnected", id, port);
                Some(RawControllerEvent::Connection {
                    port,
                    connected: false,
                    timestamp: now,
                })
            }
            EventType::AxisChanged(axis, value, _) => {
                let port = *self.ports.get(&id)?;
                let (axis, value) = map_axis(axis, value)?;
                Some(RawControllerEvent::AxisMove {
                    port,
                    axis,
                    value,
                    timestamp: now,
                })
            }
            // Analog triggers arrive as button values on most backends
            EventType::ButtonChanged(Button::LeftTrigger2, value, _) => {
                let port = *self.ports.get(&id)?;
                Some(RawControllerEvent::AxisMove {
                    port,
                    axis: AxisType::LeftTrigger,
                    value: f64::from(value),
                    timestamp: now,
                })
            }
            EventType::ButtonChanged(Button::RightTrigger2, value, _) => {
                let port = *self.ports.get(&id)?;
                Some(RawControllerEvent::AxisMove {
                    port,
                    axis: AxisType::RightTrigger,
                    value: f64::from(value),
                    timestamp: now,
                })
            }
            EventType::ButtonPressed(button, _) => {
                let port = *self.ports.get(&id)?;
                map_button(button).map(|button_type| RawControllerEvent::ButtonEvent {
                    port,
                    button_type,
                    button_state: ButtonState::Pressed,
                    timestamp: now,
                })
            }
            EventType::ButtonReleased(button, _) => {
                let port = *self.ports.get(&id)?;
                map_button(button).map(|button_type| RawControllerEvent::ButtonEvent {
                    port,
                    button_type,
                    button_state: ButtonState::Released,
                    timestamp: now,
                })
            }
            _ => None,
        }
    }
}

// The gilrs context is not Send on every platform, so it lives on its own OS thread
pub struct CollectorHandle {
    thread: Option<JoinHandle<()>>,
}

impl CollectorHandle {
    pub fn spawn(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawControllerEvent>,
        shutdown: CancellationToken,
    ) -> Result<Self, CollectorError> {
        info!("Spawning Event Collector with settings: {:?}", settings);

        let thread = std::thread::Builder::new()
            .name("gamepad-collector".to_string())
            .spawn(move || match EventCollector::create(settings, event_sender) {
                Ok(collector) => {
                    let mut collecting = collector.initialize();
                    collecting.run_collection_loop(shutdown);
                }
                Err(e) => {
                    error!("Event Collector unavailable, gamepads read neutral: {}", e);
                }
            })
            .map_err(|e| CollectorError::InitializationError(e.to_string()))?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Event Collector thread panicked");
            }
        }
    }
}

fn map_axis(axis: Axis, value: f32) -> Option<(AxisType, f64)> {
    let value = f64::from(value);
    match axis {
        Axis::LeftStickX => Some((AxisType::LeftX, value)),
        Axis::LeftStickY => Some((AxisType::LeftY, -value)),
        Axis::RightStickX => Some((AxisType::RightX, value)),
        Axis::RightStickY => Some((AxisType::RightY, -value)),
        Axis::LeftZ => Some((AxisType::LeftTrigger, value)),
        Axis::RightZ => Some((AxisType::RightTrigger, value)),
        _ => None,
    }
}

fn map_button(button: Button) -> Option<ButtonType> {
    match button {
        Button::South => Some(ButtonType::A),
        Button::East => Some(ButtonType::B),
        Button::West => Some(ButtonType::X),
        Button::North => Some(ButtonType::Y),
        Button::Select => Some(ButtonType::Back),
        Button::Start => Some(ButtonType::Start),
        Button::LeftTrigger => Some(ButtonType::LeftBumper),
        Button::RightTrigger => Some(ButtonType::RightBumper),
        Button::LeftThumb => Some(ButtonType::LeftStick),
        Button::RightThumb => Some(ButtonType::RightStick),
        Button::DPadUp => Some(ButtonType::DPadUp),
        Button::DPadDown => Some(ButtonType::DPadDown),
        Button::DPadLeft => Some(ButtonType::DPadLeft),
        Button::DPadRight => Some(ButtonType::DPadRight),
        _ => None,
    }
}
