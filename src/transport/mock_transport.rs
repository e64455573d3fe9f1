use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    device::RawEndpoint,
    error::Error,
    mock,
    transport::{Link, Transport},
};

/// Fabricates the mock catalog and its data.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockTransport;

#[async_trait]
impl Transport for MockTransport {
    fn enumerate(&self) -> Result<Vec<RawEndpoint>, Error> {
        Ok(mock::mock_endpoints())
    }

    async fn open(&self, path: &str, _baud: u32) -> Result<Box<dyn Link>, Error> {
        if !mock::is_mock_path(path) {
            return Err(Error::connection(path, "Not a mock device"));
        }

        debug!(%path, "Opening mock");

        Ok(Box::new(MockLink { open: true }))
    }
}

/// Every read yields a fresh JSON payload.
struct MockLink {
    open: bool,
}

#[async_trait]
impl Link for MockLink {
    async fn read_chunk(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, Error> {
        if !self.open {
            return Err(Error::NotConnected);
        }

        Ok(Some(mock::payload().into_bytes()))
    }

    async fn close(&mut self) {
        self.open = false;
    }
}
