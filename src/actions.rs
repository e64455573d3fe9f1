use std::{collections::BTreeMap, fmt::Display};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    device::{DeviceDescriptor, FormatHint},
    error::Error,
    mock,
};

fn yes() -> bool {
    true
}

/// Ask for a connection.
///
/// Without a path, `auto_detect` decides whether the best device is picked automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// The device to connect to.
    #[serde(default)]
    pub device_path: Option<String>,

    /// The baud rate. Defaults to the recommended rate of the device.
    #[serde(default)]
    pub baudrate: Option<u32>,

    /// Pick a device if no path is given.
    #[serde(default = "yes")]
    pub auto_detect: bool,

    /// How reads should be parsed.
    #[serde(default)]
    pub data_format: FormatHint,
}

impl Default for ConnectRequest {
    fn default() -> Self {
        Self {
            device_path: None,
            baudrate: None,
            auto_detect: true,
            data_format: FormatHint::Auto,
        }
    }
}

impl ConnectRequest {
    /// Connect to the given path with recommended settings.
    pub fn path<S: Into<String>>(path: S) -> Self {
        Self {
            device_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Connect to whatever is best.
    pub fn auto() -> Self {
        Self::default()
    }

    /// Set the baud rate.
    pub fn with_baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = Some(baudrate);
        self
    }

    /// Set the data format.
    pub fn with_format(mut self, data_format: FormatHint) -> Self {
        self.data_format = data_format;
        self
    }

    /// An example of connecting to a mock device.
    pub fn example() -> Self {
        Self::path(mock::CP2102_PATH)
            .with_baudrate(115_200)
            .with_format(FormatHint::Json)
    }
}

impl Display for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.device_path {
            Some(path) => write!(f, "connect: {path}")?,
            None if self.auto_detect => write!(f, "connect: auto")?,
            None => write!(f, "connect: ?")?,
        }

        if let Some(baudrate) = self.baudrate {
            write!(f, " @ {baudrate}")?;
        }

        write!(f, " ({})", self.data_format)
    }
}

/// The live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Unique per connect.
    pub id: Uuid,

    /// What we are connected to.
    pub device: DeviceDescriptor,

    /// The baud rate in use.
    pub baud_rate: u32,

    /// How reads are parsed unless told otherwise.
    pub data_format: FormatHint,

    /// Whether the device is a mock.
    pub is_mock: bool,

    /// When the connection was made.
    pub connected_at: DateTime<Local>,
}

impl Display for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {} ({})",
            self.device.device, self.baud_rate, self.data_format
        )
    }
}

/// Response to a successful connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    /// Human readable summary.
    pub message: String,

    /// The new connection.
    pub connection: ConnectionInfo,
}

impl From<ConnectionInfo> for ConnectResponse {
    fn from(connection: ConnectionInfo) -> Self {
        Self {
            message: format!("Connected to {connection}"),
            connection,
        }
    }
}

/// Response to a disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectResponse {
    /// Human readable summary.
    pub message: String,

    /// The connection which was closed, if there was one.
    pub previous: Option<ConnectionInfo>,
}

impl From<Option<ConnectionInfo>> for DisconnectResponse {
    fn from(previous: Option<ConnectionInfo>) -> Self {
        let message = match &previous {
            Some(connection) => format!("Disconnected from {}", connection.device.device),
            None => "No device was connected".into(),
        };

        Self { message, previous }
    }
}

/// Result of listing devices and auto-connecting to the best one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Everything listed.
    pub detected_devices: Vec<DeviceDescriptor>,

    /// The one picked.
    pub recommended_device: Option<DeviceDescriptor>,

    /// Whether connecting to it worked.
    pub auto_connected: bool,

    /// The connection, if it worked.
    pub connection: Option<ConnectionInfo>,

    /// Why it did not work.
    pub error: Option<String>,
}

/// How the service is doing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always "healthy" when answered at all.
    pub status: String,

    /// When this was computed.
    pub timestamp: DateTime<Local>,

    /// Crate version.
    pub version: String,

    /// Whether a device is connected.
    pub device_connected: bool,

    /// The connected device path.
    pub connected_device: Option<String>,

    /// Mock mode is forced, or the connected device is a mock.
    pub is_mock: bool,

    /// The operating system.
    pub platform: String,

    /// Seconds since the control center started.
    pub uptime_secs: u64,

    /// How many connects have been attempted.
    pub total_connections: usize,

    /// The most recent connect attempt.
    pub last_connection_attempt: Option<ConnectionAttempt>,
}

/// One connect attempt, kept for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionAttempt {
    /// The path tried.
    pub device: String,

    /// The baud rate used, or asked for if the attempt failed early.
    pub baud_rate: Option<u32>,

    /// When.
    pub timestamp: DateTime<Local>,

    /// Whether it worked.
    pub success: bool,

    /// Why it did not.
    pub error: Option<Error>,
}

/// What happened after being told a device was plugged in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsbInsertedReport {
    /// Nothing is listed.
    NoDevices,

    /// The only devices listed are already connected.
    AllConnected {
        /// The connected device.
        connected_device: String,
    },

    /// Connected to a new device.
    Connected {
        /// The new connection.
        connection: ConnectionInfo,
    },

    /// There was a new device, but connecting failed.
    ConnectionFailed {
        /// The device we tried.
        device: String,

        /// What went wrong.
        error: Error,
    },
}

/// A look at the catalog compared to the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorReport {
    /// Everything listed.
    pub current_devices: Vec<DeviceDescriptor>,

    /// Paths listed but not connected.
    pub available_for_connection: Vec<String>,

    /// The connected device path, after any auto-connect.
    pub connected_device: Option<String>,

    /// If nothing was connected and something was available, the new connection.
    pub auto_connected: Option<ConnectionInfo>,

    /// Why auto-connecting failed.
    pub error: Option<String>,
}

/// Query parameters for reading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataQuery {
    /// Overrides the format given when connecting.
    #[serde(default)]
    pub data_format: Option<FormatHint>,
}

/// What the service is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name.
    pub name: String,

    /// Crate version.
    pub version: String,

    /// One sentence.
    pub description: String,

    /// What it can do.
    pub features: Vec<String>,

    /// Route to what it does.
    pub endpoints: BTreeMap<String, String>,

    /// The typical order of calls.
    pub usage: Vec<String>,
}

impl ServiceInfo {
    /// Describe this service.
    pub fn new() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            name: "Serial Sense".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: "USB serial devices and their sensor data over HTTP".into(),
            features: owned(&[
                "Lists and classifies serial devices",
                "Auto-connects to the most likely device",
                "Normalizes JSON, CSV, key-value text and binary payloads",
                "Falls back to mock devices without hardware",
            ]),
            endpoints: [
                ("GET /health", "Service health"),
                ("GET /devices", "List devices"),
                ("GET /auto-detect", "List devices and connect to the best one"),
                ("POST /connect", "Connect to a device"),
                ("GET /data", "Read from the connected device"),
                ("POST /disconnect", "Disconnect"),
                ("POST /usb-inserted", "Connect to a newly inserted device"),
                ("GET /monitor-usb", "Compare devices against the connection"),
                ("GET /config", "Show the configuration"),
                ("GET /version", "Show the version"),
            ]
            .into_iter()
            .map(|(route, what)| (route.to_string(), what.to_string()))
            .collect(),
            usage: owned(&[
                "GET /devices",
                "POST /connect (or GET /auto-detect)",
                "GET /data",
                "POST /disconnect",
            ]),
        }
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn connect_request_defaults() {
        let request: ConnectRequest = serde_json::from_str("{}").unwrap();

        assert_eq!(request, ConnectRequest::auto());
        assert!(request.auto_detect);
        assert_eq!(request.data_format, FormatHint::Auto);
    }

    #[test]
    fn connect_request_fields() {
        let request: ConnectRequest = serde_json::from_str(
            r#"{"device_path": "/dev/ttyUSB0", "baudrate": 9600, "data_format": "csv"}"#,
        )
        .unwrap();

        assert_eq!(
            request,
            ConnectRequest::path("/dev/ttyUSB0")
                .with_baudrate(9600)
                .with_format(FormatHint::Csv)
        );
        assert_eq!(request.to_string(), "connect: /dev/ttyUSB0 @ 9600 (csv)");
    }

    #[test]
    fn usb_inserted_is_tagged_by_status() {
        let json = serde_json::to_value(UsbInsertedReport::NoDevices).unwrap();
        assert_eq!(json["status"], "no_devices");

        let json = serde_json::to_value(UsbInsertedReport::AllConnected {
            connected_device: "/dev/ttyUSB0".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "all_connected");
        assert_eq!(json["connected_device"], "/dev/ttyUSB0");
    }

    #[test]
    fn disconnect_message() {
        assert_eq!(
            DisconnectResponse::from(None).message,
            "No device was connected"
        );
    }
}
