//! `webthings-drivers` is a library crate that provides blocking drivers for
//! the sensors exposed by the `webthings` services.
//!
//! Each driver hides how a device is reached and how its failures look, and
//! hands back a plain, typed reading:
//!
//! - [`ds18b20`] reads a one-wire `DS18B20` thermometer through the kernel
//!   `w1` sysfs tree and waits for the device to complete its conversion.
//! - [`nut`] queries a UPS through a Network UPS Tools (`NUT`) server.
//!
//! Every driver implements [`SensorDriver`], the only capability a poller
//! needs in order to drive it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// The `DS18B20` one-wire thermometer driver.
#[cfg(feature = "ds18b20")]
pub mod ds18b20;

/// The `NUT` UPS driver.
#[cfg(feature = "nut")]
pub mod nut;

/// Driver errors.
pub mod error;
/// Readings produced by the drivers.
pub mod reading;

pub use error::{DeviceNotFound, QueryError, ReadError};
pub use reading::{PowerReading, ThermalReading};

/// A device that can be asked for one reading at a time.
///
/// Reads are blocking: they may sleep while a device settles or wait on a
/// network round trip, so callers running on an async executor must move
/// them onto a blocking worker.
pub trait SensorDriver: Send + Sync + 'static {
    /// The reading produced on success.
    type Reading: Send + 'static;

    /// A short human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Obtains a fresh reading from the device.
    ///
    /// # Errors
    ///
    /// Returns a [`ReadError`] describing why no reading could be produced.
    fn read(&self) -> Result<Self::Reading, ReadError>;
}
