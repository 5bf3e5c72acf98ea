//! Publishes the input voltage, output voltage and battery charge of a
//! UPS as Web Thing properties.
//!
//! The UPS is queried through a NUT server. A new session is opened for
//! every read, so the thing starts even when the server is not reachable yet.

use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};

use webthings_drivers::nut::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_UPS_NAME, Nut};

use webthings_poller::config::{LOG_LEVEL_ENV, LogLevel, parse_interval_ms};
use webthings_poller::description::ThingDescription;
use webthings_poller::device::DeviceThing;
use webthings_poller::shutdown::shutdown_signal;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host of the NUT server.
    #[arg(long, env = "WS_UPS_HOST", default_value = DEFAULT_HOST)]
    ups_host: String,

    /// Port of the NUT server.
    #[arg(long, env = "WS_UPS_PORT", default_value_t = DEFAULT_PORT)]
    ups_port: u16,

    /// Name of the UPS on the NUT server.
    #[arg(long, default_value = DEFAULT_UPS_NAME)]
    ups_name: String,

    /// Port of the server exposing the thing.
    #[arg(short, long, env = "WSS_UPS_SERVER_PORT", default_value_t = 8888)]
    port: u16,

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

    let driver = Nut::new(cli.ups_host.as_str(), cli.ups_port).ups_name(cli.ups_name.as_str());

    let (mut thing, values) = DeviceThing::new(ThingDescription::ups()).bind_values();
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
        "UPS thing polling `{}` at {}:{} every {:?}, exposed on port {}",
        cli.ups_name, cli.ups_host, cli.ups_port, cli.interval_ms, cli.port
    );

    shutdown_signal().await?;

    info!("canceling the sensor update looping task");
    thing.shutdown().await;
    info!("done");

    Ok(())
}
