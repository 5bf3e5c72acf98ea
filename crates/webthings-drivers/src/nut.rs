//! # NUT Driver
//!
//! This module provides a driver for a UPS managed by a Network UPS Tools
//! (`NUT`) server.
//!
//! Every measurement opens a fresh session, queries three variables and
//! closes the session again:
//!
//! - **Input voltage** (`input.voltage`) in volts
//! - **Output voltage** (`output.voltage`) in volts
//! - **Battery charge** (`battery.charge`) as a percentage
//!
//! Sessions are obtained from a [`UpsConnector`]. The default
//! [`TcpConnector`] opens plain-text sessions through the [`rups`] client;
//! any other client can be plugged in by implementing [`UpsConnector`] and
//! [`UpsSession`].
//!
//! A failed measurement is never retried here: the caller decides when to
//! ask again.

use std::str::FromStr;
use std::time::Duration;

use rups::blocking::Connection;
use rups::{ClientError, ConfigBuilder, Host};

use tracing::debug;

use crate::SensorDriver;
use crate::error::{QueryError, ReadError};
use crate::reading::PowerReading;

/// Default `NUT` server host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default `NUT` server port.
pub const DEFAULT_PORT: u16 = 3493;
/// Default UPS name on the `NUT` server.
pub const DEFAULT_UPS_NAME: &str = "ups";

// Connect, read and write timeout of a TCP session.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// Queried variables.
const INPUT_VOLTAGE: &str = "input.voltage";
const OUTPUT_VOLTAGE: &str = "output.voltage";
const BATTERY_CHARGE: &str = "battery.charge";

/// An open session with a `NUT` server.
///
/// The session is closed when the value is dropped.
pub trait UpsSession {
    /// Retrieves the value of `variable` for the UPS named `ups`.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] if the query cannot be sent, if the server
    /// rejects it, or if the answer cannot be understood.
    fn get_var(&mut self, ups: &str, variable: &str) -> Result<String, QueryError>;
}

/// A factory of [`UpsSession`]s.
pub trait UpsConnector: Send + Sync + 'static {
    /// The session type produced by this connector.
    type Session: UpsSession;

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] if the server cannot be reached.
    fn connect(&self) -> Result<Self::Session, QueryError>;
}

impl From<ClientError> for QueryError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Io(e) => Self::Io(e),
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Opens plain-text TCP sessions with a `NUT` server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnector {
    /// Creates a [`TcpConnector`] for the server at `host`:`port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the connect, read and write timeout of each session.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl UpsConnector for TcpConnector {
    type Session = TcpSession;

    fn connect(&self) -> Result<TcpSession, QueryError> {
        let host = Host::try_from((self.host.clone(), self.port))?;
        let config = ConfigBuilder::new()
            .with_host(host)
            .with_timeout(self.timeout)
            .build();

        let connection = Connection::new(&config).inspect_err(|e| {
            debug!("Unable to connect to {}:{}: {e}", self.host, self.port);
        })?;

        Ok(TcpSession {
            connection: Some(connection),
        })
    }
}

/// A plain-text TCP session with a `NUT` server.
///
/// Dropping the session sends `LOGOUT` and closes the socket.
pub struct TcpSession {
    connection: Option<Connection>,
}

impl UpsSession for TcpSession {
    fn get_var(&mut self, ups: &str, variable: &str) -> Result<String, QueryError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(QueryError::UnexpectedResponse("session closed".into()));
        };

        Ok(connection.get_var(ups, variable)?.value())
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take()
            && let Err(e) = connection.close()
        {
            debug!("Unable to log out from the NUT server: {e}");
        }
    }
}

fn parse_value<T: FromStr>(variable: &str, value: &str) -> Result<T, ReadError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ReadError::malformed(format!("invalid `{variable}` value `{value}`: {e}")))
}

/// The `NUT` UPS driver.
#[derive(Debug)]
pub struct Nut<C = TcpConnector> {
    connector: C,
    ups: String,
}

impl Nut<TcpConnector> {
    /// Creates a [`Nut`] driver for the server at `host`:`port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_connector(TcpConnector::new(host, port))
    }
}

impl<C: UpsConnector> Nut<C> {
    /// Creates a [`Nut`] driver from an arbitrary [`UpsConnector`].
    #[must_use]
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            ups: DEFAULT_UPS_NAME.into(),
        }
    }

    /// Sets the name of the UPS on the server.
    #[must_use]
    pub fn ups_name(mut self, ups: impl Into<String>) -> Self {
        self.ups = ups.into();
        self
    }

    /// Reads a single power-supply measurement.
    ///
    /// The session used for the queries is closed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`ReadError::RemoteQueryFailed`] if connecting or any of the three
    ///   queries fails. Values already retrieved are discarded.
    /// - [`ReadError::MalformedPayload`] if a value is not a number or is out
    ///   of range.
    pub fn read_power(&self) -> Result<PowerReading, ReadError> {
        let mut session = self.connector.connect()?;

        let input_voltage = session.get_var(&self.ups, INPUT_VOLTAGE)?;
        let output_voltage = session.get_var(&self.ups, OUTPUT_VOLTAGE)?;
        let battery_charge = session.get_var(&self.ups, BATTERY_CHARGE)?;
        drop(session);

        PowerReading::new(
            parse_value(INPUT_VOLTAGE, &input_voltage)?,
            parse_value(OUTPUT_VOLTAGE, &output_voltage)?,
            parse_value(BATTERY_CHARGE, &battery_charge)?,
        )
    }
}

impl<C: UpsConnector> SensorDriver for Nut<C> {
    type Reading = PowerReading;

    fn name(&self) -> &str {
        &self.ups
    }

    fn read(&self) -> Result<PowerReading, ReadError> {
        self.read_power()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::io::{self, BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct SessionCounters {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    struct MockSession {
        values: HashMap<&'static str, &'static str>,
        counters: Arc<SessionCounters>,
    }

    impl UpsSession for MockSession {
        fn get_var(&mut self, ups: &str, variable: &str) -> Result<String, QueryError> {
            assert_eq!(ups, DEFAULT_UPS_NAME);
            self.values
                .get(variable)
                .map(|value| (*value).to_owned())
                .ok_or_else(|| QueryError::Protocol("VAR-NOT-SUPPORTED".into()))
        }
    }

    impl Drop for MockSession {
        fn drop(&mut self) {
            let _ = self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockConnector {
        values: HashMap<&'static str, &'static str>,
        reachable: bool,
        counters: Arc<SessionCounters>,
    }

    impl MockConnector {
        fn new(values: &[(&'static str, &'static str)]) -> Self {
            Self {
                values: values.iter().copied().collect(),
                reachable: true,
                counters: Arc::default(),
            }
        }

        fn unreachable() -> Self {
            Self {
                reachable: false,
                ..Self::new(&[])
            }
        }
    }

    impl UpsConnector for MockConnector {
        type Session = MockSession;

        fn connect(&self) -> Result<MockSession, QueryError> {
            if !self.reachable {
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
            }

            let _ = self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(MockSession {
                values: self.values.clone(),
                counters: Arc::clone(&self.counters),
            })
        }
    }

    fn assert_sessions_closed(nut: &Nut<MockConnector>, expected: usize) {
        let counters = &nut.connector.counters;
        assert_eq!(counters.opened.load(Ordering::SeqCst), expected);
        assert_eq!(counters.closed.load(Ordering::SeqCst), expected);
    }

    const ALL_VALUES: &[(&str, &str)] = &[
        (INPUT_VOLTAGE, "230.0"),
        (OUTPUT_VOLTAGE, "229.5"),
        (BATTERY_CHARGE, "100"),
    ];

    #[test]
    fn test_read_power() {
        let nut = Nut::with_connector(MockConnector::new(ALL_VALUES));

        let reading = nut.read().unwrap();
        assert!((reading.input_voltage() - 230.0).abs() < f64::EPSILON);
        assert!((reading.output_voltage() - 229.5).abs() < f64::EPSILON);
        assert_eq!(reading.battery_charge_pct(), 100);

        // A new session for every read.
        assert!(nut.read().is_ok());
        assert_sessions_closed(&nut, 2);
    }

    #[test]
    fn test_read_power_integer_values() {
        let nut = Nut::with_connector(MockConnector::new(&[
            (INPUT_VOLTAGE, "231"),
            (OUTPUT_VOLTAGE, "0"),
            (BATTERY_CHARGE, " 87 "),
        ]));

        let reading = nut.read().unwrap();
        assert!((reading.input_voltage() - 231.0).abs() < f64::EPSILON);
        assert_eq!(reading.battery_charge_pct(), 87);
    }

    #[test]
    fn test_any_query_failure_aborts_read() {
        for missing in [INPUT_VOLTAGE, OUTPUT_VOLTAGE, BATTERY_CHARGE] {
            let values: Vec<_> = ALL_VALUES
                .iter()
                .copied()
                .filter(|(variable, _)| *variable != missing)
                .collect();
            let nut = Nut::with_connector(MockConnector::new(&values));

            let err = nut.read().unwrap_err();
            assert!(
                matches!(err, ReadError::RemoteQueryFailed(QueryError::Protocol(_))),
                "Failed for missing `{missing}`"
            );
            assert_sessions_closed(&nut, 1);
        }
    }

    #[test]
    fn test_unreachable_server() {
        let nut = Nut::with_connector(MockConnector::unreachable());

        let err = nut.read().unwrap_err();
        assert!(matches!(
            err,
            ReadError::RemoteQueryFailed(QueryError::Io(_))
        ));
        assert_sessions_closed(&nut, 0);
    }

    #[test]
    fn test_malformed_values() {
        for (variable, value) in [
            (INPUT_VOLTAGE, "n/a"),
            (OUTPUT_VOLTAGE, "-5"),
            (BATTERY_CHARGE, "120"),
            (BATTERY_CHARGE, "-1"),
            (BATTERY_CHARGE, "87.6"),
            (BATTERY_CHARGE, "full"),
        ] {
            let mut values: HashMap<_, _> = ALL_VALUES.iter().copied().collect();
            let _ = values.insert(variable, value);
            let values: Vec<_> = values.into_iter().collect();
            let nut = Nut::with_connector(MockConnector::new(&values));

            let err = nut.read().unwrap_err();
            assert!(
                matches!(err, ReadError::MalformedPayload(_)),
                "Failed for `{variable}` = `{value}`"
            );
            assert_sessions_closed(&nut, 1);
        }
    }

    // Serves a single connection and returns the commands it received,
    // without quotes.
    fn serve_once(
        values: &'static [(&'static str, &'static str)],
    ) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let reader = BufReader::new(stream);

            let mut commands = Vec::new();
            for line in reader.lines() {
                let line = line.unwrap().replace('"', "");
                commands.push(line.clone());

                if line == "LOGOUT" {
                    // The client may already be gone.
                    let _ = writeln!(writer, "OK Goodbye");
                    break;
                }

                let variable = line.rsplit(' ').next().unwrap();
                match values.iter().find(|(name, _)| *name == variable) {
                    Some((name, value)) => writeln!(writer, "VAR ups {name} \"{value}\"").unwrap(),
                    None => writeln!(writer, "ERR VAR-NOT-SUPPORTED").unwrap(),
                }
            }
            commands
        });

        (port, handle)
    }

    #[test]
    fn test_tcp_session() {
        let (port, server) = serve_once(ALL_VALUES);

        let nut = Nut::new("127.0.0.1", port);
        let reading = nut.read().unwrap();
        assert!((reading.output_voltage() - 229.5).abs() < f64::EPSILON);
        assert_eq!(reading.battery_charge_pct(), 100);

        assert_eq!(
            server.join().unwrap(),
            [
                "GET VAR ups input.voltage",
                "GET VAR ups output.voltage",
                "GET VAR ups battery.charge",
                "LOGOUT",
            ]
        );
    }

    #[test]
    fn test_tcp_session_closed_on_query_failure() {
        let (port, server) = serve_once(&[(INPUT_VOLTAGE, "230.0")]);

        let nut = Nut::new("127.0.0.1", port);
        let err = nut.read().unwrap_err();
        assert!(matches!(
            err,
            ReadError::RemoteQueryFailed(QueryError::Protocol(_))
        ));

        assert_eq!(
            server.join().unwrap(),
            [
                "GET VAR ups input.voltage",
                "GET VAR ups output.voltage",
                "LOGOUT",
            ]
        );
    }

    #[test]
    fn test_tcp_connection_refused() {
        // Bind and release a port so that nothing listens on it.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let nut = Nut::new("127.0.0.1", port);
        assert!(matches!(
            nut.read().unwrap_err(),
            ReadError::RemoteQueryFailed(QueryError::Io(_))
        ));
    }
}
