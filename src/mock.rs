//! Synthetic devices and readings for when there is no hardware.
//!
//! The catalog is fixed: the same paths and identifiers on every call.
//! Only the numbers in a reading vary.

use std::ops::RangeInclusive;

use rand::Rng;
use serde_json::json;

use crate::{
    classify::classify,
    device::{DeviceDescriptor, FormatHint, RawEndpoint},
    normalize::{normalize, SensorReading},
};

/// Every mock path starts with this.
pub const MOCK_PREFIX: &str = "/dev/cloud/";

/// A CP2102 bridge.
pub const CP2102_PATH: &str = "/dev/cloud/cp2102";

/// A temperature sensor.
pub const SENSOR_PATH: &str = "/dev/cloud/sensor";

/// The device id reported in mock payloads.
pub const MOCK_DEVICE_ID: &str = "CLOUD_DEVICE_001";

/// Degrees Celsius.
pub const TEMPERATURE: RangeInclusive<f64> = 20.0..=35.0;

/// Percent relative humidity.
pub const HUMIDITY: RangeInclusive<f64> = 40.0..=80.0;

/// Hectopascal, around standard atmospheric pressure.
pub const PRESSURE: RangeInclusive<f64> = 980.0..=1020.0;

/// Volts, a single lithium cell.
pub const BATTERY_VOLTAGE: RangeInclusive<f64> = 3.2..=4.2;

/// dBm.
pub const SIGNAL_STRENGTH: RangeInclusive<i64> = -80..=-30;

/// The endpoints behind [`mock_devices`].
pub fn mock_endpoints() -> Vec<RawEndpoint> {
    vec![
        RawEndpoint {
            path: CP2102_PATH.into(),
            description: Some("CP2102 USB to UART Bridge Controller".into()),
            manufacturer: Some("Silicon Labs".into()),
            vid: Some(0x10C4),
            pid: Some(0xEA60),
            serial_number: Some("CLOUD001".into()),
            location: Some("cloud-1".into()),
        },
        RawEndpoint {
            path: SENSOR_PATH.into(),
            description: Some("Temperature Sensor".into()),
            manufacturer: Some("Cloud Labs".into()),
            vid: Some(0x1234),
            pid: Some(0x5678),
            serial_number: Some("CLOUD002".into()),
            location: Some("cloud-2".into()),
        },
    ]
}

/// The fixed mock catalog.
pub fn mock_devices() -> Vec<DeviceDescriptor> {
    mock_endpoints()
        .iter()
        .map(|raw| classify(raw, true))
        .collect()
}

/// Whether the path belongs to a mock device.
pub fn is_mock_path(path: &str) -> bool {
    mock_endpoints().iter().any(|raw| raw.path == path)
}

fn two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A JSON payload as a mock device would send it.
pub fn payload() -> String {
    let mut rng = rand::thread_rng();

    json!({
        "temperature": two_decimals(rng.gen_range(TEMPERATURE)),
        "humidity": two_decimals(rng.gen_range(HUMIDITY)),
        "pressure": two_decimals(rng.gen_range(PRESSURE)),
        "battery_voltage": two_decimals(rng.gen_range(BATTERY_VOLTAGE)),
        "signal_strength": rng.gen_range(SIGNAL_STRENGTH),
        "device_id": MOCK_DEVICE_ID,
        "status": "active",
    })
    .to_string()
}

/// A normalized reading of a fresh [`payload`].
pub fn mock_reading() -> SensorReading {
    normalize(payload().as_bytes(), FormatHint::Auto)
}
