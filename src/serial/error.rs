use std::io;

use thiserror::Error;

use crate::error::Error;

/// Errors from talking to a serial port.
#[derive(Debug, Error)]
pub enum SerialPortError {
    /// IO related errors.
    #[error("Underlying IO problem: {0}")]
    IO(#[from] io::Error),

    /// Serial port disconnected.
    #[error("Serial port disconnected")]
    Disconnected,
}

impl From<SerialPortError> for Error {
    fn from(e: SerialPortError) -> Self {
        Error::InternalIssue(e.to_string())
    }
}
