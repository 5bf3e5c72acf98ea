use std::fmt::Debug;

use webthings_drivers::ReadError;

use tracing::{debug, error, warn};

use crate::error::Error;

/// Receives the outcome of every poll of a thing.
///
/// A reporter is handed explicitly to each thing and invoked from its
/// scheduler task, so it must be cheap and must not block.
pub trait Reporter: Send + Sync + 'static {
    /// A reading was obtained and is about to be published.
    fn reading(&self, thing: &str, reading: &dyn Debug);

    /// A read failed. Polling continues on the next tick.
    fn read_failed(&self, thing: &str, error: &ReadError);

    /// A property value could not be published.
    fn publish_failed(&self, thing: &str, property: &str, error: &Error);
}

/// A [`Reporter`] writing to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn reading(&self, thing: &str, reading: &dyn Debug) {
        debug!("`{thing}` updated: {reading:?}");
    }

    fn read_failed(&self, thing: &str, error: &ReadError) {
        error!("Unable to read `{thing}`: {error}");
    }

    fn publish_failed(&self, thing: &str, property: &str, error: &Error) {
        warn!("Unable to publish `{property}` of `{thing}`: {error}");
    }
}
