/// Serial port related errors.
pub mod error;

/// Opening and enumerating serial ports.
pub(crate) mod serial_port;

/// Codecs for decoding messages off the wire.
pub(crate) mod codecs;
