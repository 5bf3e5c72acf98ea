use crate::error::ReadError;

/// Maximum battery charge percentage.
pub const MAX_BATTERY_CHARGE: u8 = 100;

/// A single temperature measurement.
///
/// Only the Celsius value is stored by the caller; Fahrenheit is always
/// derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalReading {
    celsius: f64,
    fahrenheit: f64,
}

impl ThermalReading {
    /// Creates a [`ThermalReading`] from a temperature in degrees Celsius.
    #[must_use]
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            celsius,
            fahrenheit: celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Temperature in degrees Celsius (°C).
    #[must_use]
    pub const fn celsius(&self) -> f64 {
        self.celsius
    }

    /// Temperature in degrees Fahrenheit (°F).
    #[must_use]
    pub const fn fahrenheit(&self) -> f64 {
        self.fahrenheit
    }
}

/// A single power-supply measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    input_voltage: f64,
    output_voltage: f64,
    battery_charge_pct: u8,
}

impl PowerReading {
    /// Creates a [`PowerReading`].
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::MalformedPayload`] if a voltage is negative or not
    /// finite, or if the battery charge exceeds [`MAX_BATTERY_CHARGE`].
    pub fn new(
        input_voltage: f64,
        output_voltage: f64,
        battery_charge_pct: u8,
    ) -> Result<Self, ReadError> {
        for (name, volts) in [("input", input_voltage), ("output", output_voltage)] {
            if !volts.is_finite() || volts < 0.0 {
                return Err(ReadError::malformed(format!(
                    "{name} voltage `{volts}` is out of range"
                )));
            }
        }

        if battery_charge_pct > MAX_BATTERY_CHARGE {
            return Err(ReadError::malformed(format!(
                "battery charge `{battery_charge_pct}` exceeds {MAX_BATTERY_CHARGE}%"
            )));
        }

        Ok(Self {
            input_voltage,
            output_voltage,
            battery_charge_pct,
        })
    }

    /// Input voltage in volts (V).
    #[must_use]
    pub const fn input_voltage(&self) -> f64 {
        self.input_voltage
    }

    /// Output voltage in volts (V).
    #[must_use]
    pub const fn output_voltage(&self) -> f64 {
        self.output_voltage
    }

    /// Battery charge as a percentage (0–100).
    #[must_use]
    pub const fn battery_charge_pct(&self) -> u8 {
        self.battery_charge_pct
    }
}
