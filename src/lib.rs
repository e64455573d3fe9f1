#![deny(missing_docs)]

//! Serial Sense exposes USB serial devices over HTTP.
//!
//! Serial ports on the host are listed and classified.
//! One of them may be connected at a time, either by path or by picking the most
//! likely device automatically.
//! Whatever the connected device sends is normalized into a [`normalize::SensorReading`].
//!
//! Without hardware (or when told to), a fixed catalog of mock devices is used instead.

/// The requests a user can make, as well as the responses.
pub mod actions;

/// Guessing what a device is from its USB metadata.
pub mod classify;

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Runs on the server.
///
/// Owns the connection and the connection history.
pub mod control_center;

/// Descriptions of devices and the formats they speak.
pub mod device;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;

/// Mock devices and synthetic readings.
pub mod mock;

/// Parsing payloads into readings.
pub mod normalize;

/// Serial port driver.
pub mod serial;

/// Code relating to setting up the HTTP server.
pub mod server;

/// Real and mock endpoints behind one interface.
pub mod transport;
