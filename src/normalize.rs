//! Turning whatever a device sent into a [`SensorReading`].
//!
//! Payloads are tried against a fixed chain of strategies:
//! a JSON object, delimited rows, then `key: value` text.
//! The first strategy producing at least one field wins.
//! If none does, the payload is kept as opaque binary.
//!
//! Nothing in here fails. A payload nobody understands is still a reading,
//! just one with an empty `formatted_data`.

use std::{collections::BTreeMap, sync::LazyLock};

use chrono::{DateTime, Local};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::device::{DataFormat, FormatHint};

/// A parsed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A whole number.
    Int(i64),

    /// A number with a decimal point or an exponent.
    Float(f64),

    /// Anything else.
    Text(String),
}

impl FieldValue {
    /// Infer the value of a piece of text.
    ///
    /// Floats need a decimal point or an exponent marker,
    /// integers are plain (optionally signed) digits,
    /// everything else stays text.
    pub fn infer(text: &str) -> Self {
        let text = text.trim();

        let numeric_start = text
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));

        if numeric_start {
            if text.contains(['.', 'e', 'E']) {
                if let Ok(value) = text.parse::<f64>() {
                    if value.is_finite() {
                        return Self::Float(value);
                    }
                }
            } else if let Ok(value) = text.parse::<i64>() {
                return Self::Int(value);
            }
        }

        Self::Text(text.to_owned())
    }

    fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Number(number) => match number.as_i64() {
                Some(int) => Some(Self::Int(int)),
                None => number.as_f64().filter(|f| f.is_finite()).map(Self::Float),
            },
            Value::String(s) => Some(Self::Text(s)),
            Value::Bool(b) => Some(Self::Text(b.to_string())),
            nested @ (Value::Array(_) | Value::Object(_)) => Some(Self::Text(nested.to_string())),
        }
    }

    /// The value as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(_) => None,
        }
    }
}

/// Field name to value.
pub type Fields = BTreeMap<String, FieldValue>;

/// A parsing strategy.
/// `None` means "no match", which is the same as matching nothing.
type Strategy = fn(&str) -> Option<Fields>;

/// The strategies tried when the format is not declared, in order.
const AUTO_CHAIN: [(DataFormat, Strategy); 3] = [
    (DataFormat::Json, parse_json),
    (DataFormat::Csv, parse_delimited),
    (DataFormat::Text, parse_key_value),
];

/// Field names copied into [`SensorReading::sensor_data`].
pub const SENSOR_FIELDS: &[&str] = &[
    "temperature",
    "temp",
    "celsius",
    "humidity",
    "hum",
    "rh",
    "pressure",
    "battery_voltage",
    "battery_v",
    "voltage",
    "signal_strength",
    "rssi",
    "soc",
    "state_of_charge",
    "battery_level",
    "battery_i",
    "current",
    "rpm",
    "speed",
    "lux",
];

// Candidates per alias, most explicit name first.
const TEMP: &[&str] = &["temperature", "temp", "celsius"];
const BATTERY_V: &[&str] = &["battery_voltage", "battery_v", "voltage"];
const SOC: &[&str] = &["state_of_charge", "soc", "battery_level"];
const BATTERY_I: &[&str] = &["battery_current", "battery_i", "current"];
const RPM: &[&str] = &["rpm", "speed"];

static EMBEDDED_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("Embedded object regex is valid"));

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_ .()%/-]*$").expect("Identifier regex is valid")
});

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*[:=]\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)")
        .expect("Key-value regex is valid")
});

fn non_empty(fields: Fields) -> Option<Fields> {
    (!fields.is_empty()).then_some(fields)
}

/// The payload (or the first object embedded in it) is a JSON object.
fn parse_json(text: &str) -> Option<Fields> {
    use serde_json::{Map, Value};

    let object_of = |candidate: &str| -> Option<Map<String, Value>> {
        match serde_json::from_str(candidate) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        }
    };

    let object = object_of(text).or_else(|| {
        let embedded = EMBEDDED_OBJECT.find(text)?;
        trace!("Trying embedded object");
        object_of(embedded.as_str())
    })?;

    non_empty(
        object
            .into_iter()
            .filter_map(|(key, value)| Some((key, FieldValue::from_json(value)?)))
            .collect(),
    )
}

fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Comma or tab separated.
///
/// Either a header row followed by a value row,
/// or a single row alternating names and values.
fn parse_delimited(text: &str) -> Option<Fields> {
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    let first = *lines.first()?;
    let delimiter = if first.contains(',') {
        ','
    } else if first.contains('\t') {
        '\t'
    } else {
        return None;
    };

    fn split(line: &str, delimiter: char) -> Vec<&str> {
        line.split(delimiter).map(str::trim).collect()
    }

    let head = split(first, delimiter);

    let mut fields = Fields::new();

    if let Some(&row) = lines.get(1) {
        let values = split(row, delimiter);

        if head.len() != values.len() || !head.iter().all(|name| is_identifier(name)) {
            return None;
        }

        for (name, value) in head.into_iter().zip(values) {
            fields
                .entry(name.to_owned())
                .or_insert_with(|| FieldValue::infer(value));
        }
    } else {
        if head.len() % 2 != 0 {
            return None;
        }

        let pairs = head
            .into_iter()
            .tuples()
            .map(|(name, value)| (name, FieldValue::infer(value)))
            .collect::<Vec<_>>();

        let recognizable = pairs.iter().all(|(name, _)| is_identifier(name))
            && pairs.iter().any(|(_, value)| value.as_f64().is_some());
        if !recognizable {
            return None;
        }

        for (name, value) in pairs {
            fields.entry(name.to_owned()).or_insert(value);
        }
    }

    non_empty(fields)
}

/// Repeated `name: number` or `name=number`.
fn parse_key_value(text: &str) -> Option<Fields> {
    let mut fields = Fields::new();

    for captures in KEY_VALUE.captures_iter(text) {
        let (name, value) = (&captures[1], &captures[2]);
        fields
            .entry(name.to_owned())
            .or_insert_with(|| FieldValue::infer(value));
    }

    non_empty(fields)
}

fn strategy(format: DataFormat) -> Option<Strategy> {
    AUTO_CHAIN
        .iter()
        .find(|(candidate, _)| *candidate == format)
        .map(|(_, strategy)| *strategy)
}

fn parse_auto(text: &str) -> Option<(DataFormat, Fields)> {
    AUTO_CHAIN
        .iter()
        .find_map(|(format, strategy)| strategy(text).map(|fields| (*format, fields)))
}

fn parse(text: &str, hint: FormatHint) -> Option<(DataFormat, Fields)> {
    match hint.declared() {
        None => parse_auto(text),
        Some(DataFormat::Binary) => None,
        Some(declared) => strategy(declared)
            .and_then(|strategy| strategy(text))
            .map(|fields| (declared, fields))
            .or_else(|| {
                debug!(%declared, "Payload did not match declared format, inferring");
                parse_auto(text)
            }),
    }
}

/// Printable text is shown as is, anything else as hex.
fn opaque_representation(bytes: &[u8], cleaned: &str) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text)
            if !text
                .chars()
                .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\0')) =>
        {
            cleaned.to_owned()
        }
        _ => hex::encode(bytes),
    }
}

fn lookup<'a>(fields: &'a Fields, candidates: &[&str]) -> Option<&'a FieldValue> {
    candidates.iter().find_map(|candidate| {
        fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(candidate))
            .map(|(_, value)| value)
    })
}

fn alias(fields: &Fields, candidates: &[&str]) -> Option<f64> {
    lookup(fields, candidates).and_then(FieldValue::as_f64)
}

/// A reading, normalized from a single chunk read off a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// When the chunk was read.
    pub timestamp: DateTime<Local>,

    /// Length of the payload as received.
    pub data_size: usize,

    /// The payload. Text if it was text, hex if not.
    pub raw_data: String,

    /// Which strategy produced the fields.
    /// [`DataFormat::Binary`] if none did.
    pub data_type: DataFormat,

    /// Every parsed field.
    pub formatted_data: Fields,

    /// Only the fields with well-known sensor names.
    pub sensor_data: Fields,

    /// The device the chunk came from, if any.
    pub device: Option<String>,

    /// Temperature.
    pub temp: Option<f64>,

    /// Battery voltage.
    pub battery_v: Option<f64>,

    /// State of charge.
    pub soc: Option<f64>,

    /// Battery current.
    pub battery_i: Option<f64>,

    /// Revolutions per minute.
    pub rpm: Option<f64>,
}

impl SensorReading {
    /// Attach the device the reading came from.
    pub fn with_device<S: Into<String>>(mut self, device: Option<S>) -> Self {
        self.device = device.map(Into::into);
        self
    }

    /// A reading with no payload at all.
    pub fn empty() -> Self {
        normalize(&[], FormatHint::Auto)
    }

    /// Whether any field was parsed.
    pub fn is_parsed(&self) -> bool {
        !self.formatted_data.is_empty()
    }
}

/// Normalize a payload.
///
/// See the module documentation for the strategies.
/// A declared format is tried first. If it does not match the payload,
/// the format is inferred as if none was declared.
/// A declared [`FormatHint::Binary`] is never parsed.
pub fn normalize(bytes: &[u8], hint: FormatHint) -> SensorReading {
    let lossy = String::from_utf8_lossy(bytes);
    let cleaned = lossy.replace('\0', "");
    let cleaned = cleaned.trim();

    let (data_type, formatted_data, raw_data) = match parse(cleaned, hint) {
        Some((format, fields)) => (format, fields, cleaned.to_owned()),
        None => {
            trace!(size = bytes.len(), "No structure found, keeping as binary");
            (
                DataFormat::Binary,
                Fields::new(),
                opaque_representation(bytes, cleaned),
            )
        }
    };

    let sensor_data = formatted_data
        .iter()
        .filter(|(name, _)| {
            SENSOR_FIELDS
                .iter()
                .any(|known| name.eq_ignore_ascii_case(known))
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect::<Fields>();

    SensorReading {
        timestamp: Local::now(),
        data_size: bytes.len(),
        raw_data,
        data_type,
        temp: alias(&formatted_data, TEMP),
        battery_v: alias(&formatted_data, BATTERY_V),
        soc: alias(&formatted_data, SOC),
        battery_i: alias(&formatted_data, BATTERY_I),
        rpm: alias(&formatted_data, RPM),
        formatted_data,
        sensor_data,
        device: None,
    }
}
