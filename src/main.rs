pub mod auto;
pub mod command;
pub mod config;
pub mod container;
pub mod controller;
pub mod robot;
pub mod subsystems;
pub mod telemetry;

use crate::config::RobotConfig;
use crate::container::{RobotContainer, AUTO_MODE_KEY};
use crate::controller::{ControllerHandle, ControllerSettings, XboxController};
use crate::robot::{MatchTimeline, Robot};
use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = setup_config().await?;
    let period = Duration::from_millis(config.timeline.period_ms.max(1));

    info!("Initializing controllers");
    let controller_config = &config.controller;
    let controller_settings = ControllerSettings {
        ports: controller_config.driver_port.max(controller_config.operator_port) + 1,
        processing_interval_ms: controller_config.poll_interval_ms,
    };
    let controllers = ControllerHandle::spawn(Some(controller_settings))
        .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;

    let driver = XboxController::new(
        controller_config.driver_port,
        controllers.subscribe(controller_config.driver_port)?,
        controller_config.trigger_threshold,
    );
    let operator = XboxController::new(
        controller_config.operator_port,
        controllers.subscribe(controller_config.operator_port)?,
        controller_config.trigger_threshold,
    );

    let container = RobotContainer::new(&config, driver, operator, period)
        .map_err(|e| eyre!("Failed to configure robot: {}", e))?;
    if let Some(selected) = &config.autonomous.selected {
        if !container.dashboard().select(AUTO_MODE_KEY, selected) {
            warn!("Configured auto {} is not available", selected);
        }
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    let mut robot = Robot::new(container, MatchTimeline::from_config(&config.timeline));
    robot.run(period, shutdown).await;

    controllers.shutdown();
    info!("Robot stopped");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

async fn setup_config() -> Result<RobotConfig> {
    let path = RobotConfig::default_path()?;
    RobotConfig::ensure_default_config(&path).await?;
    RobotConfig::load(&path).await
}

/// Cancels `shutdown` once `signal` fires. A handler that failed to install leaves it running.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Ctrl-C received");
            shutdown.cancel();
        }
        Err(e) => warn!("Unable to listen for Ctrl-C, the match runs to its end: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_cancels_shutdown() {
        let shutdown = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, shutdown.clone()).await;
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn failed_signal_handler_keeps_running() {
        let shutdown = CancellationToken::new();
        let failed = async { Err(std::io::Error::other("no signal handler")) };
        cancel_on_signal(failed, shutdown.clone()).await;
        assert!(!shutdown.is_cancelled());
    }
}
