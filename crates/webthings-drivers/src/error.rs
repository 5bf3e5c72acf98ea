use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The device could not be located while constructing a driver.
///
/// This error is fatal for the device: no driver is created.
#[derive(Debug, Error)]
#[error("No sensor device exists by path `{}`", path.display())]
pub struct DeviceNotFound {
    /// The path that was searched or expected to exist.
    pub path: PathBuf,
}

impl DeviceNotFound {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Failures of a single query against a remote device server.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Connecting to, writing to or reading from the server failed.
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    /// The server answered with a protocol error, such as an unknown variable.
    #[error("server replied with `ERR {0}`")]
    Protocol(String),
    /// The server answered with a line that does not match the query.
    #[error("unexpected response `{0}`")]
    UnexpectedResponse(String),
}

/// Errors that may occur while reading a device.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The raw device data could not be read.
    #[error("device read failed: {0}")]
    Io(#[from] io::Error),
    /// The device answered, but its payload could not be interpreted.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// A query to a remote device server failed.
    #[error("remote query failed: {0}")]
    RemoteQueryFailed(#[source] QueryError),
    /// The device never reported itself ready.
    #[error("device not ready after {attempts} attempts")]
    Timeout {
        /// Number of raw reads performed before giving up.
        attempts: u32,
    },
}

impl ReadError {
    pub(crate) fn malformed(description: impl Into<String>) -> Self {
        Self::MalformedPayload(description.into())
    }
}

impl From<QueryError> for ReadError {
    fn from(e: QueryError) -> Self {
        Self::RemoteQueryFailed(e)
    }
}
