//! The `webthings-poller` library crate drives sensor drivers periodically
//! and publishes their readings as Web Thing properties.
//!
//! Core functionalities of this crate include:
//!
//! - A [`PollingScheduler`](scheduler::PollingScheduler) that reads a
//!   [`SensorDriver`](webthings_drivers::SensorDriver) at a fixed interval,
//!   never runs two reads of the same device at once, and stops cleanly on
//!   cancellation
//! - The [`PropertySink`](sink::PropertySink) contract through which every
//!   field of a reading reaches the exposure layer, together with an
//!   in-process [`Value`](sink::Value) sink that observers can subscribe to
//! - The descriptions of the properties published by each thing
//! - A [`DeviceThing`](device::DeviceThing) that binds one driver, one
//!   scheduler and one sink per published field, and forwards process
//!   shutdown to the scheduler
//!
//! Reads are blocking and run on the `tokio` blocking pool, so a slow device
//! never stalls the schedulers of other devices.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Configuration values shared by the services.
pub mod config;
/// Thing and property descriptions.
pub mod description;
/// A thing bound to a driver and to its property sinks.
pub mod device;
/// Error management.
pub mod error;
/// Reporting of readings and failures.
pub mod reporter;
/// The periodic scheduler.
pub mod scheduler;
/// Process shutdown signals.
pub mod shutdown;
/// Property sinks and values.
pub mod sink;

pub use error::{Error, ErrorKind};
