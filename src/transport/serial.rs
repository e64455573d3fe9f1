use std::time::Duration;

use async_trait::async_trait;
use futures::{FutureExt, Stream, StreamExt};
use tracing::{debug, trace, warn};

use crate::{
    device::RawEndpoint,
    error::Error,
    serial::{
        codecs::lines::LinesCodec,
        error::SerialPortError,
        serial_port::{self, SerialPortBuilder, SerialPortHandle},
    },
    transport::{Link, Transport},
};

/// The host's serial ports.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    max_chunk_len: usize,
}

impl SerialTransport {
    /// Chunks read from ports opened by this transport are at most `max_chunk_len` long.
    pub fn new(max_chunk_len: usize) -> Self {
        Self { max_chunk_len }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn enumerate(&self) -> Result<Vec<RawEndpoint>, Error> {
        serial_port::available_endpoints()
    }

    async fn open(&self, path: &str, baud: u32) -> Result<Box<dyn Link>, Error> {
        let handle = SerialPortBuilder::new(path)
            .set_baud(baud)
            .set_line_codec(LinesCodec::new(b'\n', self.max_chunk_len))
            .open()?;

        Ok(Box::new(SerialLink {
            handle: Some(handle),
            pending: None,
            max_chunk_len: self.max_chunk_len,
        }))
    }
}

/// Append lines which are ready right now to `chunk`, newline separated.
///
/// Stops at the first line not yet available. A line which would make the chunk
/// longer than `max_len` is not appended but returned, to start the next chunk.
fn drain_ready<S>(chunk: &mut Vec<u8>, lines: &mut S, max_len: usize) -> Option<Vec<u8>>
where
    S: Stream<Item = Result<Vec<u8>, SerialPortError>> + Unpin,
{
    loop {
        match lines.next().now_or_never() {
            Some(Some(Ok(line))) if line.is_empty() => continue,
            Some(Some(Ok(line))) => {
                if chunk.len() + 1 + line.len() > max_len {
                    return Some(line);
                }

                chunk.push(b'\n');
                chunk.extend(line);
            }
            Some(Some(Err(e))) => {
                // The next read runs into it again if it persists.
                warn!(%e, "Stopped collecting lines");
                return None;
            }
            Some(None) | None => return None,
        }
    }
}

struct SerialLink {
    handle: Option<SerialPortHandle>,

    /// A line read too late for the previous chunk.
    pending: Option<Vec<u8>>,

    max_chunk_len: usize,
}

#[async_trait]
impl Link for SerialLink {
    async fn read_chunk(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, Error> {
        let handle = self.handle.as_mut().ok_or(Error::NotConnected)?;

        let mut chunk = match self.pending.take() {
            Some(line) => line,
            None => {
                let deadline = tokio::time::Instant::now() + timeout;

                loop {
                    let next = tokio::time::timeout_at(deadline, handle.lines().next()).await;

                    match next {
                        Err(_) => {
                            trace!(path = handle.path(), "Nothing within timeout");
                            return Ok(None);
                        }
                        Ok(None) => return Err(SerialPortError::Disconnected.into()),
                        Ok(Some(Err(e))) => return Err(e.into()),
                        // Blank lines carry nothing.
                        Ok(Some(Ok(line))) if line.is_empty() => continue,
                        Ok(Some(Ok(line))) => break line,
                    }
                }
            }
        };

        // A header row and its values usually arrive together.
        self.pending = drain_ready(&mut chunk, handle.lines(), self.max_chunk_len);

        Ok(Some(chunk))
    }

    async fn close(&mut self) {
        self.pending = None;

        if let Some(handle) = self.handle.take() {
            debug!(path = handle.path(), "Releasing");
        }
    }
}
