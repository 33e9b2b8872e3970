//! # Daemon Management Module
//!
//! This module provides functionality for running and managing the background
//! tasks of the controller. It handles the lifecycle of:
//!
//! - The control loop driving the relay
//! - The configuration-file watcher feeding hot reloads into the loop
//! - System health monitoring (heartbeat)
//!
//! ## Architecture
//!
//! Each service runs as an independent tokio task. The daemon structure
//! tracks the task handles, shares a `running` flag for coordinated
//! shutdown, and holds the command channel into the control loop so a
//! shutdown request reaches the loop immediately even while it sleeps out
//! the remainder of a period.

use anyhow::Result;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{Config, TransportDriver};
use crate::control::{ControlLoop, ControllerCommand};
use crate::daemon::reload::ConfigWatcher;
use crate::display;
use crate::sensor;
use crate::transport::{LogTransport, RedisTransport, RelayTransport, TelemetryTransport};

/// Daemon task manager coordinating the controller's background services
///
/// The `running` flag is shared with every task; each task checks it
/// periodically and terminates gracefully when it drops. The control loop
/// additionally gets a `Stop` command so it does not wait out its current
/// sleep before cleaning up.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    commands: Option<mpsc::UnboundedSender<ControllerCommand>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance with no tasks running
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            commands: None,
        }
    }

    /// Launch all configured tasks
    ///
    /// Builds the collaborators the configuration selects (sensor driver,
    /// display driver, transport driver), then starts the control loop, the
    /// configuration watcher (if enabled) and the heartbeat monitor.
    pub fn launch(&mut self, config: Config, config_path: PathBuf) -> Result<()> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        self.commands = Some(command_tx.clone());

        self.start_control_loop(&config, command_rx)?;

        if config.reload.enabled {
            self.start_config_watcher(&config, config_path, command_tx)?;
        } else {
            info!("configuration hot reload is disabled");
        }

        self.start_heartbeat()?;
        Ok(())
    }

    /// Handle to the control loop command channel
    pub fn command_sender(&self) -> Option<mpsc::UnboundedSender<ControllerCommand>> {
        self.commands.clone()
    }

    fn start_control_loop(
        &mut self,
        config: &Config,
        command_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    ) -> Result<()> {
        info!(
            "starting control loop: period ({}) setpoint ({})",
            config.control.pwm_period, config.control.set_point
        );

        let (relay_transport, telemetry_transport) = build_transports(config);
        let sensor = sensor::from_config(&config.sensor);
        let display = display::from_config(&config.display);

        let mut control_loop = ControlLoop::new(
            &config.control,
            sensor,
            display,
            relay_transport,
            telemetry_transport,
            command_rx,
            self.running.clone(),
        );

        let task = tokio::spawn(async move { control_loop.run().await });
        self.tasks.push(task);
        Ok(())
    }

    fn start_config_watcher(
        &mut self,
        config: &Config,
        config_path: PathBuf,
        command_tx: mpsc::UnboundedSender<ControllerCommand>,
    ) -> Result<()> {
        let interval = Duration::from_secs(config.reload.interval_secs);
        info!(
            "watching {} for changes every {:?}",
            config_path.display(),
            interval
        );

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let mut watcher = ConfigWatcher::new(config_path);
            while running.load(Ordering::SeqCst) {
                time::sleep(interval).await;
                if let Some(new_config) = watcher.poll() {
                    info!("configuration file changed, applying new snapshot");
                    if command_tx
                        .send(ControllerCommand::Reconfigure(new_config.control))
                        .is_err()
                    {
                        // control loop is gone, nothing left to reconfigure
                        break;
                    }
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs liveness periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        info!("starting heartbeat monitor");

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                debug!("daemon heartbeat: running");
                time::sleep(Duration::from_secs(60)).await;
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Signal all tasks to stop gracefully
    ///
    /// Flips the shared running flag and sends `Stop` into the control loop
    /// so it performs its single graceful shutdown (relay off, session
    /// statistics) right away. Does not wait; call [`Daemon::join`] next.
    pub fn shutdown(&self) {
        info!("shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        if let Some(commands) = &self.commands {
            let _ = commands.send(ControllerCommand::Stop);
        }
    }

    /// Wait for all tasks to complete
    ///
    /// Task panics are logged but do not abort the join of the remaining
    /// tasks; a hung task is abandoned after a timeout.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match tokio::time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!("task finished with error: {e:#}"),
                Ok(Err(e)) => warn!("task panicked: {e}"),
                Err(_) => warn!("task did not complete within timeout period, may be hung"),
            }
        }
        Ok(())
    }
}

fn build_transports(config: &Config) -> (Arc<dyn RelayTransport>, Arc<dyn TelemetryTransport>) {
    match config.transport.driver {
        TransportDriver::Redis => {
            let transport = Arc::new(RedisTransport::new(config.transport.url.clone()));
            (transport.clone(), transport)
        }
        TransportDriver::Log => {
            let transport = Arc::new(LogTransport);
            (transport.clone(), transport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn daemon_starts_and_stops_cleanly() {
        let mut config = Config::default();
        config.control.pwm_period = 1.0;
        config.display.enabled = false;
        config.reload.enabled = false;

        // nonexistent path is fine: the watcher is disabled
        let mut daemon = Daemon::new();
        daemon
            .launch(config, PathBuf::from("/nonexistent/proofbox.yaml"))
            .unwrap();

        time::sleep(Duration::from_millis(100)).await;
        daemon.shutdown();
        daemon.join().await.unwrap();
    }
}
