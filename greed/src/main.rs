//! Gree AC daemon
//!
//! Drives one Gree split-system indoor unit over its UART: loads the static
//! configuration, opens the serial port (or a simulated unit with `--mock`),
//! polls on a fixed interval and logs every published state change.
//! With `--console`, climate and accessory commands are read from stdin.

mod config;
mod console;
mod sensor;
mod shutdown;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gree_core::{default_config_path, ClimateSnapshot, DefaultUnit, StaticConfig};
use gree_hardware::{
    available_ports, Accessories, ByteStream, CommandQueue, DriverConfig, PollingDriver,
    SerialDriver, SimulatedUnit,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Gree AC UART daemon
#[derive(Parser, Debug)]
#[command(name = "greed")]
#[command(version, about = "Gree split-system UART driver daemon", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device path (e.g., /dev/ttyS1, /dev/ttyUSB0)
    ///
    /// Takes precedence over [device].port in the config file.
    #[arg(long)]
    device: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log every UART frame sent and received
    #[arg(long)]
    debug_uart: bool,

    /// Enable mock mode (drive a simulated indoor unit instead of hardware)
    #[arg(long)]
    mock: bool,

    /// Accept control commands on stdin
    #[arg(long)]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    info!("Gree AC daemon starting...");

    // Determine config path: CLI flag > env var > default
    let config_path = args.config.clone().unwrap_or_else(|| {
        std::env::var("GREE_AC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let static_config = config::load(&config_path)
        .await
        .context("Failed to load configuration")?;
    config::log_summary(&static_config);

    let stream = open_stream(&args, &static_config)?;

    let debug_uart = args.debug_uart || static_config.device.debug_uart;
    let queue = Arc::new(CommandQueue::new(
        static_config.polling.max_command_retries,
    ));
    let (mut driver, handle) = PollingDriver::with_watch(
        stream,
        queue,
        static_config.climate.capabilities(),
        DriverConfig::from_polling(&static_config.polling, debug_uart),
    );
    if let Some(sensor_config) = &static_config.sensor {
        driver = driver.with_sensor(Box::new(sensor::FileSensor::new(sensor_config)));
    }

    let accessories = Accessories::from_bindings(&static_config.accessories, &handle);
    if accessories.is_empty() {
        info!("No accessories bound");
    }

    let logger = spawn_state_logger(&static_config.device.id, handle.subscribe());

    if args.console {
        let console = console::Console::new(handle.clone(), accessories);
        tokio::spawn(console::run(console));
    }

    let mut ticks = tokio::time::interval(static_config.polling.interval());
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Daemon ready!");
    driver.run(ticks, shutdown::signal()).await;

    shutdown::log_final_stats(&driver.stats());

    // Dropping the driver closes the watch channel and ends the logger
    drop(driver);
    if let Err(e) = logger.await {
        warn!("State logger ended abnormally: {}", e);
    }

    info!("Daemon shutdown complete");
    Ok(())
}

/// Open the configured serial port, or a simulated unit in mock mode
fn open_stream(args: &Args, static_config: &StaticConfig) -> Result<Box<dyn ByteStream>> {
    if args.mock {
        info!("Mock mode: driving a simulated indoor unit");
        let (unit, _control) = SimulatedUnit::new();
        return Ok(Box::new(unit));
    }

    let Some(port) = args
        .device
        .clone()
        .or_else(|| static_config.device.port.clone())
    else {
        let ports = available_ports().unwrap_or_default();
        bail!(
            "No serial port configured. Use --device <path>, set [device].port, or --mock.\n  \
             Available ports: {}",
            if ports.is_empty() {
                "<none found>".to_string()
            } else {
                ports.join(", ")
            }
        );
    };

    info!("Connecting to '{}' at {}...", static_config.device.id, port);
    let serial = SerialDriver::<DefaultUnit>::new(
        &port,
        static_config.polling.response_timeout(),
    )
    .with_context(|| {
        format!(
            "Failed to open serial port {}. Use --mock for testing without hardware.",
            port
        )
    })?;
    Ok(Box::new(serial))
}

/// Log every published snapshot as JSON
fn spawn_state_logger(
    device_id: &str,
    mut updates: watch::Receiver<ClimateSnapshot>,
) -> JoinHandle<()> {
    let device_id = device_id.to_string();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            match serde_json::to_string(&snapshot) {
                Ok(json) => info!("{}: {}", device_id, json),
                Err(e) => warn!("Failed to serialize state of {}: {}", device_id, e),
            }
        }
    })
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
