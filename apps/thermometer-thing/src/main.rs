//! Publishes the temperature of a DS18B20 one-wire thermometer as the
//! `temp` property of a Web Thing.
//!
//! The thermometer is probed once at startup and read periodically until the
//! process receives `Ctrl-C` or `SIGTERM`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};

use webthings_drivers::DeviceNotFound;
use webthings_drivers::ds18b20::{DEFAULT_DEVICES_DIR, Ds18b20};

use webthings_poller::config::{LOG_LEVEL_ENV, LogLevel, parse_interval_ms};
use webthings_poller::description::ThingDescription;
use webthings_poller::device::DeviceThing;
use webthings_poller::shutdown::shutdown_signal;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Port of the server exposing the thing.
    #[arg(short, long, env = "WSS_THERMO_SERVER_PORT", default_value_t = 8884)]
    port: u16,

    /// Directory listing the one-wire devices.
    #[arg(long, default_value = DEFAULT_DEVICES_DIR)]
    devices_dir: PathBuf,

    /// Interval between two reads, in milliseconds.
    #[arg(long, default_value = "5000", value_parser = parse_interval_ms)]
    interval_ms: Duration,

    /// Maximum log level, either a name or a numeric level.
    #[arg(long, env = LOG_LEVEL_ENV, default_value_t = LogLevel::default())]
    log_level: LogLevel,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Device(#[from] DeviceNotFound),
    #[error(transparent)]
    Thing(#[from] webthings_poller::Error),
    #[error("unable to wait for the shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level.level())
        .init();

    let driver = Ds18b20::with_devices_dir(&cli.devices_dir)?;
    info!("Thermometer found at `{}`", driver.device_file().display());

    let (mut thing, values) = DeviceThing::new(ThingDescription::thermometer()).bind_values();
    debug!("Thing description: {}", thing.description().to_json());

    for (property, value) in values {
        let mut receiver = value.subscribe();
        let _ = tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let current = *receiver.borrow_and_update();
                info!("`{property}` = {current}");
            }
        });
    }

    thing.start(driver, cli.interval_ms)?;
    info!(
        "Thermometer thing polling every {:?}, exposed on port {}",
        cli.interval_ms, cli.port
    );

    shutdown_signal().await?;

    info!("canceling the sensor update looping task");
    thing.shutdown().await;
    info!("done");

    Ok(())
}
