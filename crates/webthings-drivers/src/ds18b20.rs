//! # DS18B20 Driver
//!
//! This module provides a driver for the `DS18B20` one-wire digital
//! thermometer, as exposed by the Linux `w1-therm` kernel module.
//!
//! The kernel publishes every thermometer as a directory named after its
//! family code (`28`) and serial number, for example
//! `/sys/bus/w1/devices/28-0316a2797aff/`. Reading the `w1_slave` file in that
//! directory triggers a conversion and returns two lines:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The first line ends with `YES` once the conversion is complete and the
//! CRC matches. The second line carries the temperature in thousandths of a
//! degree Celsius after the `t=` marker.
//!
//! A device that is not ready is polled again after a short delay, up to the
//! number of attempts allowed by its [`RetryPolicy`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::SensorDriver;
use crate::error::{DeviceNotFound, ReadError};
use crate::reading::ThermalReading;

/// Directory where the kernel publishes one-wire devices.
pub const DEFAULT_DEVICES_DIR: &str = "/sys/bus/w1/devices";

// Family code of the DS18B20 thermometer.
const FAMILY_PREFIX: &str = "28";
// File exposing the raw conversion output.
const DEVICE_FILE: &str = "w1_slave";
// Trailing token of the first line once the conversion is valid.
const READY_MARKER: &str = "YES";
// Token preceding the temperature on the second line.
const TEMPERATURE_MARKER: &str = "t=";
// The device reports thousandths of a degree Celsius.
const MILLIDEGREES_PER_DEGREE: f64 = 1000.0;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// A source of raw device output, one entry per line.
pub trait RawSource: Send + Sync + 'static {
    /// Reads the current raw output of the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device output cannot be read.
    fn read_lines(&self) -> io::Result<Vec<String>>;
}

/// The `w1_slave` file of a thermometer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct W1SlaveFile {
    path: PathBuf,
}

impl W1SlaveFile {
    /// Path of the device file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawSource for W1SlaveFile {
    fn read_lines(&self) -> io::Result<Vec<String>> {
        Ok(fs::read_to_string(&self.path)?
            .lines()
            .map(str::to_owned)
            .collect())
    }
}

/// How often and how many times a not-ready device is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between two consecutive raw reads.
    pub delay: Duration,
    /// Maximum number of raw reads for a single measurement.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a [`RetryPolicy`].
    ///
    /// A `max_attempts` of zero is treated as a single attempt.
    #[must_use]
    pub const fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY, DEFAULT_MAX_ATTEMPTS)
    }
}

/// Locates the `w1_slave` file of the first thermometer in `devices_dir`.
///
/// Entries are considered in lexical order, so the same device is chosen on
/// every start.
///
/// # Errors
///
/// Returns [`DeviceNotFound`] if the directory cannot be listed, if no entry
/// carries the `DS18B20` family prefix, or if the device file is missing.
pub fn probe(devices_dir: impl AsRef<Path>) -> Result<PathBuf, DeviceNotFound> {
    let devices_dir = devices_dir.as_ref();
    let pattern = devices_dir.join(format!("{FAMILY_PREFIX}*"));

    let entries = fs::read_dir(devices_dir).map_err(|e| {
        warn!("Unable to read {}: {e}", devices_dir.display());
        DeviceNotFound::new(&pattern)
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(FAMILY_PREFIX))
        })
        .map(|entry| entry.path())
        .collect();
    candidates.sort();

    let Some(device_dir) = candidates.first() else {
        return Err(DeviceNotFound::new(pattern));
    };

    if candidates.len() > 1 {
        warn!(
            "Found {} thermometers, using {}",
            candidates.len(),
            device_dir.display()
        );
    }

    let device_file = device_dir.join(DEVICE_FILE);
    if !device_file.exists() {
        return Err(DeviceNotFound::new(device_file));
    }

    debug!("Thermometer found at {}", device_file.display());

    Ok(device_file)
}

/// The `DS18B20` driver.
#[derive(Debug)]
pub struct Ds18b20<S = W1SlaveFile> {
    source: S,
    retry: RetryPolicy,
}

impl Ds18b20<W1SlaveFile> {
    /// Creates a [`Ds18b20`] driver for the first thermometer found in
    /// [`DEFAULT_DEVICES_DIR`].
    ///
    /// # Errors
    ///
    /// Returns [`DeviceNotFound`] if no thermometer is present.
    pub fn new() -> Result<Self, DeviceNotFound> {
        Self::with_devices_dir(DEFAULT_DEVICES_DIR)
    }

    /// Creates a [`Ds18b20`] driver for the first thermometer found in
    /// `devices_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceNotFound`] if no thermometer is present.
    pub fn with_devices_dir(devices_dir: impl AsRef<Path>) -> Result<Self, DeviceNotFound> {
        let path = probe(devices_dir)?;
        Ok(Self::with_source(W1SlaveFile { path }))
    }

    /// Path of the device file the driver reads.
    #[must_use]
    pub fn device_file(&self) -> &Path {
        self.source.path()
    }
}

impl<S: RawSource> Ds18b20<S> {
    /// Creates a [`Ds18b20`] driver reading from an arbitrary [`RawSource`].
    #[must_use]
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the [`RetryPolicy`] used while the device is not ready.
    #[must_use]
    pub const fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reads the raw device output once, without waiting for readiness.
    ///
    /// # Errors
    ///
    /// Returns an error if the device output cannot be read.
    pub fn read_raw(&self) -> io::Result<Vec<String>> {
        self.source.read_lines()
    }

    /// Reads a temperature, polling the device until it reports ready.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`ReadError::MalformedPayload`] if a ready payload carries no
    ///   parsable temperature. Such payloads are not retried.
    /// - [`ReadError::Io`] if the last allowed attempt failed to read the
    ///   device.
    /// - [`ReadError::Timeout`] if the device never reported ready.
    pub fn read_temperature(&self) -> Result<ThermalReading, ReadError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let last_error = match self.read_raw() {
                Ok(lines) if is_ready(&lines) => return parse_temperature(&lines),
                Ok(_) => {
                    debug!("Thermometer not ready (attempt {attempts}/{max_attempts})");
                    None
                }
                Err(e) => {
                    warn!("Unable to read thermometer (attempt {attempts}/{max_attempts}): {e}");
                    Some(e)
                }
            };

            if attempts >= max_attempts {
                return Err(last_error.map_or(ReadError::Timeout { attempts }, ReadError::Io));
            }

            thread::sleep(self.retry.delay);
        }
    }
}

impl<S: RawSource> SensorDriver for Ds18b20<S> {
    type Reading = ThermalReading;

    fn name(&self) -> &str {
        "DS18B20"
    }

    fn read(&self) -> Result<ThermalReading, ReadError> {
        self.read_temperature()
    }
}

#[inline]
fn is_ready(lines: &[String]) -> bool {
    lines
        .first()
        .is_some_and(|line| line.trim_end().ends_with(READY_MARKER))
}

fn parse_temperature(lines: &[String]) -> Result<ThermalReading, ReadError> {
    let line = lines
        .get(1)
        .ok_or_else(|| ReadError::malformed("missing temperature line"))?;

    let position = line.find(TEMPERATURE_MARKER).ok_or_else(|| {
        ReadError::malformed(format!("no `{TEMPERATURE_MARKER}` marker in `{line}`"))
    })?;

    let text = line[position + TEMPERATURE_MARKER.len()..].trim();
    let millidegrees: f64 = text
        .parse()
        .map_err(|e| ReadError::malformed(format!("invalid temperature `{text}`: {e}")))?;

    if !millidegrees.is_finite() {
        return Err(ReadError::malformed(format!(
            "invalid temperature `{text}`"
        )));
    }

    Ok(ThermalReading::from_celsius(
        millidegrees / MILLIDEGREES_PER_DEGREE,
    ))
}
