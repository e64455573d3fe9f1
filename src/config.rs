use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{error::Error, server::DEFAULT_PORT};

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_read_timeout_ms() -> u64 {
    3000
}

fn default_max_chunk_len() -> usize {
    4096
}

fn yes() -> bool {
    true
}

/// The configuration used for running the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Never touch real serial ports, only list and connect to mock devices.
    #[serde(default)]
    pub force_mock: bool,

    /// How long a read waits for data before giving up.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// The longest chunk a single read returns.
    #[serde(default = "default_max_chunk_len")]
    pub max_chunk_len: usize,

    /// List mock devices when the host has no serial ports,
    /// or when they cannot be listed.
    #[serde(default = "yes")]
    pub serial_mock_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            force_mock: false,
            read_timeout_ms: default_read_timeout_ms(),
            max_chunk_len: default_max_chunk_len(),
            serial_mock_fallback: yes(),
        }
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(e.to_string()))
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            port: 8080,
            force_mock: true,
            read_timeout_ms: 1500,
            ..Default::default()
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap_or_else(|e| format!("Could not serialize configuration: {e}"))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let path = p.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::BadConfig(format!("Could not read {path:?}: {e}")))?;

        Self::deserialize(&s)
    }

    /// Apply environment overrides.
    ///
    /// `CLOUD` or `RENDER` being set at all forces mock mode,
    /// as does a truthy `SERIAL_SENSE_FORCE_MOCK`.
    /// `SERIAL_SENSE_PORT` sets the port.
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(variable) = ["CLOUD", "RENDER"]
            .into_iter()
            .find(|variable| lookup(*variable).is_some())
        {
            info!(%variable, "Cloud environment, forcing mock mode");
            self.force_mock = true;
        }

        if lookup("SERIAL_SENSE_FORCE_MOCK").map_or(false, |value| truthy(&value)) {
            info!("Mock mode forced by environment");
            self.force_mock = true;
        }

        if let Some(port) = lookup("SERIAL_SENSE_PORT") {
            self.port = port.trim().parse().map_err(|e| {
                Error::BadConfig(format!("SERIAL_SENSE_PORT `{port}` is not a port: {e}"))
            })?;
        }

        Ok(self)
    }

    /// Check values which parse fine but make no sense.
    pub fn validate(&self) -> Result<(), Error> {
        if self.read_timeout_ms == 0 {
            return Err(Error::BadConfig(
                "The read timeout must be more than zero milliseconds".into(),
            ));
        }

        if self.max_chunk_len == 0 {
            return Err(Error::BadConfig(
                "The maximum chunk length must be more than zero bytes".into(),
            ));
        }

        Ok(())
    }
}
