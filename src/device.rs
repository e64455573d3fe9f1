use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The kind of device an endpoint is guessed to be.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceCategory {
    /// A microcontroller board, such as an Arduino or an ESP32.
    Microcontroller,

    /// A USB to serial bridge chip, such as a CP2102 or an FTDI.
    UsbBridge,

    /// Some sensor.
    Sensor,

    /// A GPS module.
    Gps,

    /// Anything else.
    Generic,
}

impl Display for DeviceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeviceCategory::Microcontroller => "microcontroller",
            DeviceCategory::UsbBridge => "usb-bridge",
            DeviceCategory::Sensor => "sensor",
            DeviceCategory::Gps => "gps",
            DeviceCategory::Generic => "generic",
        };

        write!(f, "{s}")
    }
}

/// How a payload is (or was) encoded.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// A JSON object.
    Json,

    /// Delimited rows, comma or tab separated.
    Csv,

    /// Lines of `key: value` or `key=value` text.
    Text,

    /// Opaque bytes.
    Binary,
}

impl DataFormat {
    /// Every concrete format.
    pub const ALL: [DataFormat; 4] = [
        DataFormat::Json,
        DataFormat::Csv,
        DataFormat::Text,
        DataFormat::Binary,
    ];
}

impl Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataFormat::Json => "json",
            DataFormat::Csv => "csv",
            DataFormat::Text => "text",
            DataFormat::Binary => "binary",
        };

        write!(f, "{s}")
    }
}

/// The format a caller asks for when connecting or reading.
///
/// [`FormatHint::Auto`] means the format is inferred per read.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    /// Infer the format from the payload.
    #[default]
    Auto,

    /// Expect JSON.
    Json,

    /// Expect delimited rows.
    Csv,

    /// Expect key-value text.
    Text,

    /// Do not parse at all.
    Binary,
}

impl FormatHint {
    /// The declared format, if any.
    pub fn declared(self) -> Option<DataFormat> {
        match self {
            FormatHint::Auto => None,
            FormatHint::Json => Some(DataFormat::Json),
            FormatHint::Csv => Some(DataFormat::Csv),
            FormatHint::Text => Some(DataFormat::Text),
            FormatHint::Binary => Some(DataFormat::Binary),
        }
    }
}

impl Display for FormatHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.declared() {
            Some(format) => write!(f, "{format}"),
            None => write!(f, "auto"),
        }
    }
}

/// An endpoint as reported by a transport, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEndpoint {
    /// The path, likely "/dev/ttyUSBx" or "COMx".
    pub path: String,

    /// Human readable description, if the host knows one.
    pub description: Option<String>,

    /// The manufacturer string.
    pub manufacturer: Option<String>,

    /// USB vendor id.
    pub vid: Option<u16>,

    /// USB product id.
    pub pid: Option<u16>,

    /// The device's serial number.
    pub serial_number: Option<String>,

    /// Where the device sits, e.g. a USB bus location.
    pub location: Option<String>,
}

impl RawEndpoint {
    /// A hardware id string like `USB VID:PID=10C4:EA60 SER=0001`,
    /// if vendor and product ids are known.
    pub fn hwid(&self) -> Option<String> {
        let (vid, pid) = (self.vid?, self.pid?);

        let mut hwid = format!("USB VID:PID={vid:04X}:{pid:04X}");
        if let Some(serial) = &self.serial_number {
            hwid += &format!(" SER={serial}");
        }

        Some(hwid)
    }
}

/// One classified endpoint.
///
/// Created fresh on every catalog listing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct DeviceDescriptor {
    /// The endpoint path (or name).
    pub device: String,

    /// Human readable description.
    pub description: String,

    /// The manufacturer, if known.
    pub manufacturer: Option<String>,

    /// USB vendor id.
    pub vid: Option<u16>,

    /// USB product id.
    pub pid: Option<u16>,

    /// The device's serial number.
    pub serial_number: Option<String>,

    /// Where the device sits.
    pub location: Option<String>,

    /// Hardware id string.
    pub hwid: Option<String>,

    /// Whether this is the device currently connected.
    pub is_connected: bool,

    /// The guessed category.
    pub device_type: DeviceCategory,

    /// The baud rate recommended for the category.
    pub recommended_baudrate: u32,

    /// Formats the device is expected to produce.
    pub supported_formats: Vec<DataFormat>,

    /// Whether this is a synthetic device.
    pub is_mock: bool,
}

impl Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.device, self.description, self.device_type)?;

        if self.is_mock {
            write!(f, " [mock]")?;
        }

        Ok(())
    }
}
