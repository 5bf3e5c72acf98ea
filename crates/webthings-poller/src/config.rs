use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::Level;

use crate::error::{Error, ErrorKind};

/// Default interval between two reads of the same device.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Environment variable holding the log level of every service.
pub const LOG_LEVEL_ENV: &str = "WSS_LOG_LEVEL";

/// The maximum level of the emitted log records.
///
/// It can be parsed from a level name (`trace`, `debug`, `info`, `warn`,
/// `warning`, `error`, `critical`) or from a numeric level where `10` is
/// `debug`, `20` is `info`, `30` is `warn` and `40` or more is `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(Level);

impl LogLevel {
    /// Creates a [`LogLevel`] from a [`Level`].
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self(level)
    }

    /// Returns the wrapped [`Level`].
    #[must_use]
    pub const fn level(self) -> Level {
        self.0
    }

    const fn from_number(number: u32) -> Self {
        Self(match number {
            0..10 => Level::TRACE,
            10..20 => Level::DEBUG,
            20..30 => Level::INFO,
            30..40 => Level::WARN,
            _ => Level::ERROR,
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self(Level::INFO)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(number) = s.parse::<u32>() {
            return Ok(Self::from_number(number));
        }

        let level = match s.to_ascii_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" | "critical" => Level::ERROR,
            _ => {
                return Err(Error::new(
                    ErrorKind::Config,
                    format!("Unknown log level `{s}`"),
                ));
            }
        };

        Ok(Self(level))
    }
}

/// Parses a polling interval expressed in milliseconds.
///
/// # Errors
///
/// Returns an error if the value is not a positive integer.
pub fn parse_interval_ms(s: &str) -> Result<Duration, Error> {
    match s.trim().parse::<u64>() {
        Ok(0) => Err(Error::new(
            ErrorKind::Config,
            "The polling interval must be greater than zero",
        )),
        Ok(millis) => Ok(Duration::from_millis(millis)),
        Err(e) => Err(Error::with_info(
            ErrorKind::Config,
            format!("Invalid polling interval `{s}`"),
            e.to_string(),
        )),
    }
}
