use serialport::SerialPortType;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{Decoder, Framed};
use tracing::{debug, info};

use crate::{
    device::RawEndpoint,
    error::Error,
    serial::codecs::lines::LinesCodec,
};

/// Builder for a [`SerialPortHandle`].
#[derive(Debug)]
pub(crate) struct SerialPortBuilder {
    baud: u32,
    flow_control: serialport::FlowControl,
    path: String,
    line_codec: LinesCodec,
}

impl SerialPortBuilder {
    /// Start a new builder.
    /// The path should likely be along the lines of `/dev/ttyACMx` on unix, and `COMx` on Windows.
    pub(crate) fn new(path: &str) -> Self {
        Self {
            baud: 115_200,
            flow_control: serialport::FlowControl::None,
            path: path.to_owned(),
            line_codec: LinesCodec::default(),
        }
    }

    /// Set the baud rate.
    pub(crate) fn set_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Set the [`LinesCodec`] to use.
    pub(crate) fn set_line_codec(mut self, codec: LinesCodec) -> Self {
        self.line_codec = codec;
        self
    }

    /// Open the port, 8N1.
    ///
    /// A single attempt. Must be called within a Tokio runtime.
    pub(crate) fn open(self) -> Result<SerialPortHandle, Error> {
        let Self {
            baud,
            flow_control,
            path,
            line_codec,
        } = self;

        let stream = tokio_serial::new(&path, baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(flow_control)
            .open_native_async()
            .map_err(|e| Error::connection(&path, e))?;

        info!(%path, %baud, "Opened serial port");

        Ok(SerialPortHandle {
            framed: line_codec.framed(stream),
            path,
        })
    }
}

/// An open serial port, yielding lines.
pub(crate) struct SerialPortHandle {
    path: String,
    framed: Framed<SerialStream, LinesCodec>,
}

impl SerialPortHandle {
    /// The lines coming off the port.
    /// Ends if the port went away.
    pub(crate) fn lines(&mut self) -> &mut Framed<SerialStream, LinesCodec> {
        &mut self.framed
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for SerialPortHandle {
    fn drop(&mut self) {
        debug!(path = %self.path, "Closing serial port");
    }
}

/// List the serial ports of the host.
pub(crate) fn available_endpoints() -> Result<Vec<RawEndpoint>, Error> {
    let ports = serialport::available_ports().map_err(|e| Error::Enumeration(e.to_string()))?;

    Ok(ports
        .into_iter()
        .map(|info| {
            let mut raw = RawEndpoint {
                path: info.port_name,
                ..Default::default()
            };

            match info.port_type {
                SerialPortType::UsbPort(usb) => {
                    raw.description = usb.product;
                    raw.manufacturer = usb.manufacturer;
                    raw.vid = Some(usb.vid);
                    raw.pid = Some(usb.pid);
                    raw.serial_number = usb.serial_number;
                }
                SerialPortType::BluetoothPort => {
                    raw.description = Some("Bluetooth serial port".into());
                }
                SerialPortType::PciPort => {
                    raw.description = Some("PCI serial port".into());
                }
                SerialPortType::Unknown => {}
            }

            raw
        })
        .collect())
}
