//! Controller Handle - Unified API for gamepad input processing
//!
//! Wires the collector thread to the processor task and hands out one
//! `watch::Receiver<ControllerState>` per port. Both halves stop when the
//! handle's cancellation token fires.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::event_collector::{CollectorError, CollectorHandle, CollectorSettings};
use super::event_processor::{ControllerState, ProcessorHandle, ProcessorSettings};

/// Configuration settings for the complete controller subsystem
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// Number of gamepad ports
    pub ports: usize,

    /// How often the processor publishes snapshots, in milliseconds
    pub processing_interval_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            ports: 2,
            processing_interval_ms: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    #[error("Port {port} is not available, {ports} ports configured")]
    PortOutOfRange { port: usize, ports: usize },
}

pub struct ControllerHandle {
    processor: ProcessorHandle,
    collector: CollectorHandle,
    ports: usize,
    shutdown: CancellationToken,
}

impl ControllerHandle {
    /// Spawns the collector thread and the processor task.
    ///
    /// Must be called from within a tokio runtime. A missing gamepad is not an error: its port
    /// simply reads neutral until one connects.
    pub fn spawn(settings: Option<ControllerSettings>) -> Result<Self, ControllerError> {
        let settings = settings.unwrap_or_default();
        info!("Initializing Controller system with settings: {:?}", settings);

        let collector_settings = CollectorSettings {
            ports: settings.ports,
            ..Default::default()
        };
        let processor_settings = ProcessorSettings {
            processing_interval_ms: settings.processing_interval_ms,
        };

        let (event_sender, event_receiver) = mpsc::channel(1000);
        debug!("Created event channel with buffer capacity 1000");

        let shutdown = CancellationToken::new();

        let collector =
            CollectorHandle::spawn(Some(collector_settings), event_sender, shutdown.clone())?;
        let processor = ProcessorHandle::spawn(
            event_receiver,
            settings.ports,
            Some(processor_settings),
            shutdown.clone(),
        );

        info!("Controller system initialized successfully");
        Ok(Self {
            processor,
            collector,
            ports: settings.ports,
            shutdown,
        })
    }

    pub fn subscribe(&self, port: usize) -> Result<watch::Receiver<ControllerState>, ControllerError> {
        self.processor
            .subscribe(port)
            .ok_or(ControllerError::PortOutOfRange {
                port,
                ports: self.ports,
            })
    }

    pub fn shutdown(mut self) {
        info!("Shutting down Controller system");
        self.shutdown.cancel();
        self.processor.abort();
        self.collector.join();
    }
}
