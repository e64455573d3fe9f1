//! The Control Center owns the (at most one) connection.
//!
//! It runs as a single task. Requests arrive over a channel and are handled
//! one at a time, so a state transition such as closing the old link and
//! opening a new one is never interleaved with another request.

use std::{
    collections::VecDeque,
    fmt::{Debug, Display},
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Local;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt, StreamExt,
};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    actions::{
        ConnectRequest, ConnectionAttempt, ConnectionInfo, DetectionReport, HealthStatus,
        MonitorReport, UsbInsertedReport,
    },
    classify::{classify, select_best},
    config::Config,
    device::{DeviceDescriptor, FormatHint},
    error::Error,
    mock,
    normalize::{normalize, SensorReading},
    transport::{
        mock_transport::MockTransport, normalize_path, serial::SerialTransport, Link, Transport,
    },
};

/// How many connect attempts are remembered.
pub const HISTORY_LEN: usize = 64;

struct ConnectionState {
    info: ConnectionInfo,
    link: Box<dyn Link>,
}

/// Actions available to ask of the control center.
#[derive(Debug)]
pub(crate) enum Action {
    ListDevices,
    Connect(ConnectRequest),
    Detect,
    Read(Option<FormatHint>),
    Disconnect,
    Health,
    UsbInserted,
    Monitor,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::ListDevices => write!(f, "list devices"),
            Action::Connect(request) => write!(f, "{request}"),
            Action::Detect => write!(f, "detect"),
            Action::Read(Some(format)) => write!(f, "read ({format})"),
            Action::Read(None) => write!(f, "read"),
            Action::Disconnect => write!(f, "disconnect"),
            Action::Health => write!(f, "health"),
            Action::UsbInserted => write!(f, "usb inserted"),
            Action::Monitor => write!(f, "monitor"),
        }
    }
}

pub(crate) struct Request {
    action: Action,
    response: oneshot::Sender<Result<ControlCenterResponse, Error>>,
}

impl Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("action", &self.action)
            .finish()
    }
}

#[derive(Debug)]
pub(crate) enum ControlCenterResponse {
    Devices(Vec<DeviceDescriptor>),
    Connected(ConnectionInfo),
    Detection(DetectionReport),
    Reading(SensorReading),
    Disconnected(Option<ConnectionInfo>),
    Health(HealthStatus),
    UsbInserted(UsbInsertedReport),
    Monitor(MonitorReport),
}

fn unexpected(response: ControlCenterResponse) -> Error {
    Error::InternalIssue(format!("Unexpected control center response: {response:?}"))
}

/// A cheaply cloneable way to talk to the control center.
#[derive(Debug, Clone)]
pub struct ControlCenterHandle(mpsc::UnboundedSender<Request>);

impl ControlCenterHandle {
    /// Spawn a control center using the host's serial ports.
    /// Must be called within a Tokio runtime.
    pub fn new(config: &Config) -> Self {
        Self::with_transport(config, Arc::new(SerialTransport::new(config.max_chunk_len)))
    }

    /// Spawn a control center using the given transport for real devices.
    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded::<Request>();

        let mut control_center = ControlCenter::new(config.clone(), transport, requests_rx);

        tokio::spawn(
            async move { control_center.run().await }.instrument(info_span!("ControlCenter")),
        );

        ControlCenterHandle(requests_tx)
    }

    async fn perform_action(&mut self, action: Action) -> Result<ControlCenterResponse, Error> {
        let (tx, rx) = oneshot::channel();

        self.0
            .send(Request {
                action,
                response: tx,
            })
            .await
            .map_err(|_| Error::InternalIssue("The control center is gone".into()))?;

        rx.await
            .map_err(|_| Error::InternalIssue("The control center dropped a request".into()))?
    }

    /// List devices, falling back to the mock catalog when there is nothing real.
    pub async fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>, Error> {
        match self.perform_action(Action::ListDevices).await? {
            ControlCenterResponse::Devices(devices) => Ok(devices),
            other => Err(unexpected(other)),
        }
    }

    /// Connect, replacing any existing connection.
    ///
    /// Without a path the best device is picked, if the request allows it.
    pub async fn connect(&mut self, request: ConnectRequest) -> Result<ConnectionInfo, Error> {
        match self.perform_action(Action::Connect(request)).await? {
            ControlCenterResponse::Connected(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    /// Connect to the best device.
    pub async fn auto_connect(&mut self) -> Result<ConnectionInfo, Error> {
        self.connect(ConnectRequest::auto()).await
    }

    /// List devices and auto-connect, reporting how it went.
    pub async fn detect(&mut self) -> Result<DetectionReport, Error> {
        match self.perform_action(Action::Detect).await? {
            ControlCenterResponse::Detection(report) => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    /// Read from the connected device.
    ///
    /// The given format overrides the one set when connecting.
    pub async fn read(&mut self, format: Option<FormatHint>) -> Result<SensorReading, Error> {
        match self.perform_action(Action::Read(format)).await? {
            ControlCenterResponse::Reading(reading) => Ok(reading),
            other => Err(unexpected(other)),
        }
    }

    /// Disconnect, if connected.
    /// Returns the closed connection.
    pub async fn disconnect(&mut self) -> Result<Option<ConnectionInfo>, Error> {
        match self.perform_action(Action::Disconnect).await? {
            ControlCenterResponse::Disconnected(previous) => Ok(previous),
            other => Err(unexpected(other)),
        }
    }

    /// How things are.
    pub async fn health(&mut self) -> Result<HealthStatus, Error> {
        match self.perform_action(Action::Health).await? {
            ControlCenterResponse::Health(health) => Ok(health),
            other => Err(unexpected(other)),
        }
    }

    /// Connect to the first listed device which is not already connected.
    pub async fn usb_inserted(&mut self) -> Result<UsbInsertedReport, Error> {
        match self.perform_action(Action::UsbInserted).await? {
            ControlCenterResponse::UsbInserted(report) => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    /// Compare the catalog against the connection,
    /// auto-connecting if nothing is connected.
    pub async fn monitor(&mut self) -> Result<MonitorReport, Error> {
        match self.perform_action(Action::Monitor).await? {
            ControlCenterResponse::Monitor(report) => Ok(report),
            other => Err(unexpected(other)),
        }
    }
}

pub(crate) struct ControlCenter {
    /// Requests for the control center to handle.
    requests: mpsc::UnboundedReceiver<Request>,

    config: Config,

    /// Real devices.
    transport: Arc<dyn Transport>,

    /// Mock devices.
    mock_transport: MockTransport,

    connection: Option<ConnectionState>,

    /// The most recent attempts, oldest first.
    history: VecDeque<ConnectionAttempt>,

    /// Every attempt ever, including those dropped from `history`.
    total_attempts: usize,

    started: Instant,
}

impl ControlCenter {
    pub(crate) fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        requests: mpsc::UnboundedReceiver<Request>,
    ) -> Self {
        Self {
            requests,
            config,
            transport,
            mock_transport: MockTransport,
            connection: None,
            history: VecDeque::with_capacity(HISTORY_LEN),
            total_attempts: 0,
            started: Instant::now(),
        }
    }

    fn connected_path(&self) -> Option<&str> {
        self.connection
            .as_ref()
            .map(|state| state.info.device.device.as_str())
    }

    fn mock_catalog(&self) -> Vec<DeviceDescriptor> {
        match self.mock_transport.enumerate() {
            Ok(endpoints) => endpoints.iter().map(|raw| classify(raw, true)).collect(),
            Err(e) => {
                warn!(%e, "Listing mock devices failed");
                vec![]
            }
        }
    }

    fn fallback_catalog(&self) -> Vec<DeviceDescriptor> {
        if self.config.serial_mock_fallback {
            self.mock_catalog()
        } else {
            vec![]
        }
    }

    /// Probed anew on every call.
    fn catalog(&self) -> Vec<DeviceDescriptor> {
        let mut catalog = if self.config.force_mock {
            self.mock_catalog()
        } else {
            match self.transport.enumerate() {
                Ok(endpoints) if !endpoints.is_empty() => endpoints
                    .iter()
                    .map(|raw| classify(raw, false))
                    .collect(),
                Ok(_) => {
                    debug!("No serial ports available");
                    self.fallback_catalog()
                }
                Err(e) => {
                    warn!(%e, "Listing serial ports failed");
                    self.fallback_catalog()
                }
            }
        };

        if let Some(connected) = self.connected_path() {
            for device in catalog.iter_mut() {
                device.is_connected = device.device == connected;
            }
        }

        catalog
    }

    async fn release(&mut self) -> Option<ConnectionInfo> {
        let mut state = self.connection.take()?;

        state.link.close().await;
        info!(connection = %state.info, "Released");

        Some(state.info)
    }

    async fn open(
        &mut self,
        path: &str,
        baud_rate: Option<u32>,
        data_format: FormatHint,
    ) -> Result<ConnectionInfo, Error> {
        if path.is_empty() {
            return Err(Error::BadUsage("The device path is empty".into()));
        }

        if baud_rate == Some(0) {
            return Err(Error::BadUsage("A baud rate of zero is not valid".into()));
        }

        let catalog = self.catalog();

        let descriptor = if mock::is_mock_path(path) {
            self.mock_catalog()
                .into_iter()
                .find(|device| device.device == path)
        } else {
            catalog.into_iter().find(|device| device.device == path)
        }
        .ok_or_else(|| Error::connection(path, "Unknown device path"))?;

        let baud_rate = baud_rate.unwrap_or(descriptor.recommended_baudrate);
        let is_mock = descriptor.is_mock;

        if let Some(previous) = self.release().await {
            debug!(%previous, "Superseded");
        }

        let link = if is_mock {
            self.mock_transport.open(path, baud_rate).await?
        } else {
            self.transport.open(path, baud_rate).await?
        };

        let info = ConnectionInfo {
            id: Uuid::new_v4(),
            device: DeviceDescriptor {
                is_connected: true,
                ..descriptor
            },
            baud_rate,
            data_format,
            is_mock,
            connected_at: Local::now(),
        };

        info!(connection = %info, "Connected");

        self.connection = Some(ConnectionState {
            info: info.clone(),
            link,
        });

        Ok(info)
    }

    async fn connect(&mut self, request: ConnectRequest) -> Result<ConnectionInfo, Error> {
        let path = match &request.device_path {
            Some(path) => normalize_path(path),
            None if request.auto_detect => {
                let catalog = self.catalog();
                let best = select_best(&catalog).ok_or(Error::NoDevices)?;
                debug!(%best, "Auto-selected");

                best.device.clone()
            }
            None => {
                return Err(Error::BadUsage(
                    "Either give a device path or allow auto-detection".into(),
                ))
            }
        };

        let result = self
            .open(&path, request.baudrate, request.data_format)
            .await;

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }

        self.total_attempts += 1;
        self.history.push_back(ConnectionAttempt {
            device: path,
            baud_rate: match &result {
                Ok(info) => Some(info.baud_rate),
                Err(_) => request.baudrate,
            },
            timestamp: Local::now(),
            success: result.is_ok(),
            error: result.as_ref().err().cloned(),
        });

        result
    }

    async fn detect(&mut self) -> DetectionReport {
        let detected_devices = self.catalog();
        let recommended_device = select_best(&detected_devices).cloned();

        let (connection, error) = match &recommended_device {
            Some(device) => match self.connect(ConnectRequest::path(&device.device)).await {
                Ok(info) => (Some(info), None),
                Err(e) => (None, Some(e.to_string())),
            },
            None => (None, Some(Error::NoDevices.to_string())),
        };

        DetectionReport {
            detected_devices,
            recommended_device,
            auto_connected: connection.is_some(),
            connection,
            error,
        }
    }

    async fn read(&mut self, format: Option<FormatHint>) -> Result<SensorReading, Error> {
        let timeout = Duration::from_millis(self.config.read_timeout_ms);

        let Some(state) = self.connection.as_mut() else {
            return if self.config.force_mock {
                debug!("Not connected, reading from mock");
                Ok(mock::mock_reading())
            } else {
                Err(Error::NotConnected)
            };
        };

        let format = format.unwrap_or(state.info.data_format);
        let device = Some(state.info.device.device.clone());

        let reading = match state.link.read_chunk(timeout).await {
            Ok(Some(bytes)) => normalize(&bytes, format),
            Ok(None) => {
                debug!(?timeout, "Nothing read within timeout");
                SensorReading::empty()
            }
            Err(e) => {
                warn!(%e, "Read failed");
                SensorReading::empty()
            }
        };

        Ok(reading.with_device(device))
    }

    fn health(&self) -> HealthStatus {
        let connected = self.connection.as_ref().map(|state| &state.info);

        HealthStatus {
            status: "healthy".into(),
            timestamp: Local::now(),
            version: env!("CARGO_PKG_VERSION").into(),
            device_connected: connected.is_some(),
            connected_device: connected.map(|info| info.device.device.clone()),
            is_mock: self.config.force_mock || connected.map_or(false, |info| info.is_mock),
            platform: std::env::consts::OS.into(),
            uptime_secs: self.started.elapsed().as_secs(),
            total_connections: self.total_attempts,
            last_connection_attempt: self.history.back().cloned(),
        }
    }

    async fn usb_inserted(&mut self) -> UsbInsertedReport {
        let catalog = self.catalog();
        let connected = self.connected_path().map(ToOwned::to_owned);

        let candidate = catalog
            .into_iter()
            .map(|device| device.device)
            .find(|device| Some(device.as_str()) != connected.as_deref());

        match (candidate, connected) {
            (Some(device), _) => match self.connect(ConnectRequest::path(&device)).await {
                Ok(connection) => UsbInsertedReport::Connected { connection },
                Err(error) => UsbInsertedReport::ConnectionFailed { device, error },
            },
            (None, Some(connected_device)) => UsbInsertedReport::AllConnected { connected_device },
            (None, None) => UsbInsertedReport::NoDevices,
        }
    }

    async fn monitor(&mut self) -> MonitorReport {
        let current_devices = self.catalog();

        let available_for_connection = current_devices
            .iter()
            .filter(|device| !device.is_connected)
            .map(|device| device.device.clone())
            .collect::<Vec<_>>();

        let (auto_connected, error) = match available_for_connection.first() {
            Some(first) if self.connection.is_none() => {
                match self.connect(ConnectRequest::path(first)).await {
                    Ok(info) => (Some(info), None),
                    Err(e) => (None, Some(e.to_string())),
                }
            }
            _ => (None, None),
        };

        MonitorReport {
            current_devices,
            available_for_connection,
            connected_device: self.connected_path().map(ToOwned::to_owned),
            auto_connected,
            error,
        }
    }

    async fn handle_action(&mut self, action: Action) -> Result<ControlCenterResponse, Error> {
        Ok(match action {
            Action::ListDevices => ControlCenterResponse::Devices(self.catalog()),
            Action::Connect(request) => ControlCenterResponse::Connected(self.connect(request).await?),
            Action::Detect => ControlCenterResponse::Detection(self.detect().await),
            Action::Read(format) => ControlCenterResponse::Reading(self.read(format).await?),
            Action::Disconnect => ControlCenterResponse::Disconnected(self.release().await),
            Action::Health => ControlCenterResponse::Health(self.health()),
            Action::UsbInserted => ControlCenterResponse::UsbInserted(self.usb_inserted().await),
            Action::Monitor => ControlCenterResponse::Monitor(self.monitor().await),
        })
    }

    pub(crate) async fn run(&mut self) {
        while let Some(Request { action, response }) = self.requests.next().await {
            let span = info_span!("Request", %action);

            let result = self.handle_action(action).instrument(span.clone()).await;

            if let Err(e) = &result {
                span.in_scope(|| debug!(%e, "Request failed"));
            }

            if response.send(result).is_err() {
                warn!("Requester went away before the response");
            }
        }

        if self.release().await.is_some() {
            debug!("Closed connection on shutdown");
        }

        info!("No more requests, stopping");
    }
}
