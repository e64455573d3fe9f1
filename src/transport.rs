//! The seam between the control center and actual ports.
//!
//! A [`Transport`] lists endpoints and opens them.
//! An opened endpoint is a [`Link`], which yields chunks of bytes.

use std::time::Duration;

use async_trait::async_trait;

use crate::{device::RawEndpoint, error::Error, mock};

/// Real serial ports.
pub mod serial;

/// Mock devices.
pub mod mock_transport;

/// Something which knows about endpoints and can open them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// List the endpoints available right now.
    fn enumerate(&self) -> Result<Vec<RawEndpoint>, Error>;

    /// Open the endpoint at the given speed.
    /// A single attempt.
    async fn open(&self, path: &str, baud: u32) -> Result<Box<dyn Link>, Error>;
}

/// An open endpoint.
///
/// Owned exclusively by whoever opened it.
#[async_trait]
pub trait Link: Send {
    /// Read one chunk.
    ///
    /// `Ok(None)` if nothing arrived within the timeout.
    async fn read_chunk(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, Error>;

    /// Release the endpoint.
    /// Closing twice is fine.
    async fn close(&mut self);
}

fn normalize_path_for(path: &str, windows: bool) -> String {
    let path = path.trim();

    if path.is_empty() || path.starts_with(mock::MOCK_PREFIX) {
        return path.to_owned();
    }

    if windows {
        if path.chars().all(|c| c.is_ascii_digit()) {
            format!("COM{path}")
        } else {
            path.to_owned()
        }
    } else if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/dev/{path}")
    }
}

/// Turn a bare device name into a full path.
///
/// `ttyUSB0` becomes `/dev/ttyUSB0` on unix-likes, and `3` becomes `COM3` on Windows.
pub fn normalize_path(path: &str) -> String {
    normalize_path_for(path, cfg!(windows))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unix_paths() {
        assert_eq!(normalize_path_for("ttyUSB0", false), "/dev/ttyUSB0");
        assert_eq!(normalize_path_for(" ttyACM1 ", false), "/dev/ttyACM1");
        assert_eq!(normalize_path_for("/dev/ttyUSB0", false), "/dev/ttyUSB0");
        assert_eq!(
            normalize_path_for("/dev/cloud/cp2102", false),
            "/dev/cloud/cp2102"
        );
        assert_eq!(normalize_path_for("", false), "");
    }

    #[test]
    fn windows_paths() {
        assert_eq!(normalize_path_for("3", true), "COM3");
        assert_eq!(normalize_path_for("COM3", true), "COM3");
        assert_eq!(
            normalize_path_for("/dev/cloud/sensor", true),
            "/dev/cloud/sensor"
        );
    }
}
