//! # NAP HAL Binary
//!
//! Synchronizes the DS1337 clock and schedules halt/restart cycles.
//!
//! # Usage
//!
//! ```bash
//! # Sync the RTC to system time
//! nap_hal --config /etc/nap/nap.toml sync
//!
//! # Print the RTC time
//! nap_hal --config /etc/nap/nap.toml read-time
//!
//! # Power off and wake up again in ten minutes
//! nap_hal --config /etc/nap/nap.toml halt --after 600
//!
//! # Dry run against the simulated chip, verbose
//! nap_hal --config config/nap.toml -s -v halt --after 20
//! ```

#![deny(warnings)]

use clap::{Parser, Subcommand};
use nap_common::config::LogLevel;
use nap_common::rtc::config::load_nap_config;
use nap_common::rtc::consts::{DEFAULT_CONFIG_PATH, NAP_SERVICE_NAME};
use nap_hal::core::{NapCore, Startup};
use nap_hal::driver_registry::DriverRegistry;
use nap_hal::shutdown::CommandShutdown;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// NAP HAL - RTC halt/restart orchestrator
#[derive(Parser, Debug)]
#[command(name = "nap_hal")]
#[command(version)]
#[command(about = "Halt the board and wake it up again with a DS1337 RTC alarm")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file (nap.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force simulation driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize the RTC to system time and report the outcome
    Sync,
    /// Print the current RTC time
    ReadTime,
    /// Program the wake alarm and halt the board
    Halt {
        /// Seconds until the board is powered on again
        #[arg(long, value_name = "SECS")]
        after: u32,
    },
}

fn main() {
    if let Err(e) = run() {
        error!("nap failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = load_nap_config(&args.config);
    let log_level = loaded
        .as_ref()
        .map(|(shared, _)| shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    let (shared, mut config) = loaded?;
    info!(
        "{} v{} starting ({})...",
        NAP_SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        shared.service_name
    );

    if args.simulate {
        info!("Simulation mode enabled");
        config.driver = "simulation".to_string();
    }

    let registry = DriverRegistry::with_builtin_drivers();
    let bus = registry.create_driver(&config.driver)?;
    let shutdown = CommandShutdown::from_config(&config);

    let core = match NapCore::start(config, bus, Box::new(shutdown))? {
        Startup::Ready(core) => {
            info!("RTC ready");
            core
        }
        Startup::Degraded { core, cause } => {
            warn!("RTC unavailable, running in mock mode: {}", cause);
            core
        }
    };

    match args.command {
        Command::Sync => {
            if core.is_disabled() {
                println!("degraded");
            } else {
                println!("ready");
            }
        }
        Command::ReadTime => {
            let time = core.read_time()?;
            println!("{}", time.format("%Y-%m-%dT%H:%M:%SZ"));
        }
        Command::Halt { after } => {
            let report = core.halt_and_restart(after)?;
            match report.wake {
                Some(wake) => info!("Halt complete, wake at {}", wake),
                None => info!("Halt complete (mock)"),
            }
        }
    }

    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::new(LogLevel::Debug.as_directive())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
