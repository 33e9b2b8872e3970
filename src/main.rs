// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the proofbox project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the proofing enclosure temperature controller

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::signal;

use proofbox::config::Config;
use proofbox::daemon::Daemon;

/// Time-proportioning temperature controller for a heated proofing enclosure
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long, default_value = "proofbox.yaml")]
    config: PathBuf,

    /// Validate the configuration file and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Target temperature override
    #[arg(long)]
    set_point: Option<f64>,

    /// Software-PWM period override, in seconds
    #[arg(long)]
    period: Option<f64>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    // Validate configuration file if --validate-config is set
    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }
        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    // Load configuration; a missing file is fatal, never defaulted
    if !args.config.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file does not exist: {}",
            args.config.display()
        ));
    }
    let mut config = Config::from_file(&args.config)?;

    // Apply command line overrides
    if let Some(set_point) = args.set_point {
        config.control.set_point = set_point;
    }
    if let Some(period) = args.period {
        config.control.pwm_period = period;
    }
    config.validate()?;

    info!("starting in daemon mode");
    let mut daemon = Daemon::new();
    daemon.launch(config, args.config)?;

    // Wait for termination signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal, terminating daemon");
            daemon.shutdown();
            daemon.join().await?;
        }
        Err(err) => {
            eprintln!("Error waiting for shutdown signal: {}", err);
        }
    }

    Ok(())
}
