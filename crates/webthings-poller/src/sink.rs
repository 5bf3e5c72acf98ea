use std::fmt;

use serde::Serialize;

use tokio::sync::watch;

use crate::error::Result;

/// A property value handed to a [`PropertySink`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// A floating-point number.
    Number(f64),
    /// An integer number.
    Integer(i64),
}

impl Default for PropertyValue {
    fn default() -> Self {
        Self::Number(0.0)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u8> for PropertyValue {
    fn from(value: u8) -> Self {
        Self::Integer(i64::from(value))
    }
}

/// The publish-only interface through which a property value reaches the
/// exposure layer.
///
/// `publish` is called from the scheduler task of a device, once per tick
/// and field. It is expected to notify the observers of the property.
/// A returned error is reported and otherwise ignored: it never stops the
/// polling of the device.
pub trait PropertySink: Send + Sync {
    /// Publishes a new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be published.
    fn publish(&self, value: PropertyValue) -> Result<()>;
}

/// An in-process property value.
///
/// It stores the last published value and notifies every subscriber when a
/// new one arrives.
#[derive(Debug)]
pub struct Value {
    sender: watch::Sender<PropertyValue>,
}

impl Value {
    /// Creates a [`Value`] holding `initial`.
    #[must_use]
    pub fn new(initial: PropertyValue) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Returns the last published value.
    #[must_use]
    pub fn get(&self) -> PropertyValue {
        *self.sender.borrow()
    }

    /// Subscribes to the published values.
    ///
    /// The receiver sees the current value as already seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PropertyValue> {
        self.sender.subscribe()
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::new(PropertyValue::default())
    }
}

impl PropertySink for Value {
    fn publish(&self, value: PropertyValue) -> Result<()> {
        // Values are stored even without subscribers.
        let _ = self.sender.send_replace(value);
        Ok(())
    }
}
