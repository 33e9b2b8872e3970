//! # Daemon Module
//!
//! Runs and manages the background services of the controller: the control
//! loop itself, the configuration-file watcher that feeds it hot reloads, and
//! a heartbeat monitor.
//!
//! ## Usage
//!
//! ```no_run
//! use proofbox::{config::Config, daemon::launch_daemon::Daemon};
//! use std::path::PathBuf;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config_path = PathBuf::from("proofbox.yaml");
//!     let config = Config::from_file(&config_path)?;
//!
//!     // Create and launch daemon
//!     let mut daemon = Daemon::new();
//!     daemon.launch(config, config_path)?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;
pub mod reload;

pub use launch_daemon::Daemon;
pub use reload::ConfigWatcher;
