//! Controller subsystem for gamepad input handling
//!
//! ```text
//! Gamepads ──► Collector ──► Processor ──► watch<ControllerState> per port ──► XboxController
//!              (OS thread)   (tokio task)
//! ```
//!
//! 1. [`event_collector`] - Raw gilrs events, assigned to ports in connection order
//! 2. [`event_processor`] - Folds events into one [`ControllerState`] per port
//! 3. [`controller_handle`] - Lifecycle and subscription
//! 4. [`xbox`] - Named axes and [`Trigger`](crate::command::trigger::Trigger) factories

pub mod controller_handle;
pub mod event_collector;
pub mod event_processor;
pub mod xbox;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};
pub use event_collector::{AxisType, ButtonType};
pub use event_processor::ControllerState;
pub use xbox::XboxController;
