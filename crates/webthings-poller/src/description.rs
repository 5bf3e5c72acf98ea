use indexmap::IndexMap;

use serde::Serialize;

/// Temperature property of the thermometer, in degrees Celsius.
pub const TEMPERATURE: &str = "temp";
/// Input voltage property of the UPS, in volts.
pub const VOLTAGE_IN: &str = "voltagein";
/// Output voltage property of the UPS, in volts.
pub const VOLTAGE_OUT: &str = "voltageout";
/// Battery charge property of the UPS, as a percentage.
pub const BATTERY_CHARGE: &str = "batterycharge";

// Semantic type of a multi-level sensor thing.
const MULTI_LEVEL_SENSOR: &str = "MultiLevelSensor";
// Semantic type of a bounded numeric property.
const LEVEL_PROPERTY: &str = "LevelProperty";
// Data type of every published property.
const NUMBER: &str = "number";

/// Description of a read-only numeric property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDescription {
    /// Semantic type.
    #[serde(rename = "@type")]
    pub semantic_type: &'static str,
    /// Human-readable title.
    pub title: &'static str,
    /// Data type.
    #[serde(rename = "type")]
    pub data_type: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Lowest advertised value.
    pub minimum: f64,
    /// Highest advertised value.
    pub maximum: f64,
    /// Unit of measure.
    pub unit: &'static str,
    /// Whether the property can only be read.
    #[serde(rename = "readOnly")]
    pub read_only: bool,
}

impl PropertyDescription {
    /// Creates a read-only level [`PropertyDescription`] ranging from
    /// `minimum` to `maximum`.
    #[must_use]
    pub const fn level(
        title: &'static str,
        description: &'static str,
        unit: &'static str,
        minimum: f64,
        maximum: f64,
    ) -> Self {
        Self {
            semantic_type: LEVEL_PROPERTY,
            title,
            data_type: NUMBER,
            description,
            minimum,
            maximum,
            unit,
            read_only: true,
        }
    }
}

/// Description of a thing and of the properties it publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThingDescription {
    /// Unique thing identifier.
    pub id: &'static str,
    /// Human-readable title.
    pub title: &'static str,
    /// Semantic types.
    #[serde(rename = "@type")]
    pub semantic_types: Vec<&'static str>,
    /// Human-readable description.
    pub description: &'static str,
    /// Published properties, in publication order.
    pub properties: IndexMap<&'static str, PropertyDescription>,
}

impl ThingDescription {
    /// Creates a multi-level sensor [`ThingDescription`] without properties.
    #[must_use]
    pub fn multi_level_sensor(
        id: &'static str,
        title: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            id,
            title,
            semantic_types: vec![MULTI_LEVEL_SENSOR],
            description,
            properties: IndexMap::new(),
        }
    }

    /// Adds a property.
    ///
    /// A property with the same name is replaced.
    #[must_use]
    pub fn property(mut self, name: &'static str, property: PropertyDescription) -> Self {
        let _ = self.properties.insert(name, property);
        self
    }

    /// Describes a `DS18B20` thermometer connected to the one-wire bus.
    #[must_use]
    pub fn thermometer() -> Self {
        Self::multi_level_sensor(
            "urn:dev:ops:thermometer-sensor-DS18B20",
            "Thermometer Sensor",
            "Thermometer sensor, connected to GPIO of RPI",
        )
        .property(
            TEMPERATURE,
            PropertyDescription::level(
                "Temperature",
                "The current temperature in C",
                "celsius",
                -80.,
                80.,
            ),
        )
    }

    /// Describes a UPS managed by a `NUT` server.
    #[must_use]
    pub fn ups() -> Self {
        Self::multi_level_sensor(
            "urn:dev:ops:my-nut-ups-device",
            "UPS Device",
            "A web connected UPS Device",
        )
        .property(
            VOLTAGE_IN,
            PropertyDescription::level(
                "Voltage In",
                "The current input voltage in V",
                "volt",
                0.,
                380.,
            ),
        )
        .property(
            VOLTAGE_OUT,
            PropertyDescription::level(
                "Voltage Out",
                "The UPS output voltage in V",
                "volt",
                0.,
                380.,
            ),
        )
        .property(
            BATTERY_CHARGE,
            PropertyDescription::level(
                "Battery Charge",
                "The current battery charge level in %",
                "percent",
                0.,
                100.,
            ),
        )
    }

    /// Serializes the description into a `JSON` value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        // Serializing plain strings, numbers and maps cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }
}
