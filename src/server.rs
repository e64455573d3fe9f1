use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::Query,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    actions::{
        ConnectRequest, ConnectResponse, DataQuery, DetectionReport, DisconnectResponse,
        HealthStatus, MonitorReport, ServiceInfo, UsbInsertedReport,
    },
    config::Config,
    control_center::ControlCenterHandle,
    device::DeviceDescriptor,
    error::Error,
    normalize::SensorReading,
};

/// The default port to run the server on.
pub const DEFAULT_PORT: u16 = 8000;

/// All routes, sharing one control center.
pub fn router(config: Config, cc_handle: ControlCenterHandle) -> Router {
    Router::new()
        .route("/", get(show_service))
        .route("/health", get(health))
        .route("/devices", get(list_devices))
        .route("/auto-detect", get(auto_detect))
        .route("/connect", post(connect))
        .route("/data", get(read_data))
        .route("/disconnect", post(disconnect))
        .route("/usb-inserted", post(usb_inserted))
        .route("/monitor-usb", get(monitor_usb))
        .route("/config", get(show_config))
        .route("/version", get(show_version))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Browsers on any origin may call the API.
                .layer(CorsLayer::permissive())
                // Each handler needs to be able to reach the control center
                .layer(Extension(cc_handle))
                .layer(Extension(config)),
        )
}

async fn run(
    config: Config,
    port: Option<u16>,
    allocated_port: Option<oneshot::Sender<u16>>,
) -> Result<(), Error> {
    config.validate()?;

    let cc_handle = ControlCenterHandle::new(&config);
    let app = router(config, cc_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(0)));
    let server = axum::Server::try_bind(&addr)
        .map_err(|e| Error::InternalIssue(format!("Could not bind to {addr}: {e}")))?
        .serve(app.into_make_service());
    let addr = server.local_addr();

    if let Some(port_reply) = allocated_port {
        if port_reply.send(addr.port()).is_err() {
            warn!("Nobody is waiting for the allocated port");
        }
    }

    info!("listening on {}", addr);

    server
        .await
        .map_err(|e| Error::InternalIssue(format!("Server problem: {e}")))
}

/// Start the server on an arbitrary available port.
/// The port allocated will be sent on the provided channel.
pub async fn run_any_port(config: Config, allocated_port: oneshot::Sender<u16>) -> Result<(), Error> {
    run(config, None, Some(allocated_port)).await
}

/// Start the server on the given port.
pub async fn run_on_port(config: Config, port: u16) -> Result<(), Error> {
    run(config, Some(port), None).await
}

async fn show_service() -> Json<ServiceInfo> {
    Json(ServiceInfo::new())
}

async fn health(Extension(mut cc): Extension<ControlCenterHandle>) -> Result<Json<HealthStatus>, Error> {
    Ok(Json(cc.health().await?))
}

async fn list_devices(
    Extension(mut cc): Extension<ControlCenterHandle>,
) -> Result<Json<Vec<DeviceDescriptor>>, Error> {
    let devices = cc.list_devices().await?;
    info!("Found {} devices", devices.len());

    Ok(Json(devices))
}

async fn auto_detect(
    Extension(mut cc): Extension<ControlCenterHandle>,
) -> Result<Json<DetectionReport>, Error> {
    let report = cc.detect().await?;
    info!(
        found = report.detected_devices.len(),
        connected = report.auto_connected,
        "Auto-detection done"
    );

    Ok(Json(report))
}

/// An empty body asks for an auto-connect.
/// Anything else has to be a valid [`ConnectRequest`].
fn connect_request(body: &[u8]) -> Result<ConnectRequest, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ConnectRequest::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| Error::BadUsage(format!("Not a valid connect request: {e}")))
}

async fn connect(
    Extension(mut cc): Extension<ControlCenterHandle>,
    body: Bytes,
) -> Result<Json<ConnectResponse>, Error> {
    let request = connect_request(&body)?;

    Ok(Json(cc.connect(request).await?.into()))
}

async fn read_data(
    Extension(mut cc): Extension<ControlCenterHandle>,
    Query(query): Query<DataQuery>,
) -> Result<Json<SensorReading>, Error> {
    Ok(Json(cc.read(query.data_format).await?))
}

async fn disconnect(
    Extension(mut cc): Extension<ControlCenterHandle>,
) -> Result<Json<DisconnectResponse>, Error> {
    Ok(Json(cc.disconnect().await?.into()))
}

async fn usb_inserted(
    Extension(mut cc): Extension<ControlCenterHandle>,
) -> Result<Json<UsbInsertedReport>, Error> {
    Ok(Json(cc.usb_inserted().await?))
}

async fn monitor_usb(
    Extension(mut cc): Extension<ControlCenterHandle>,
) -> Result<Json<MonitorReport>, Error> {
    Ok(Json(cc.monitor().await?))
}

async fn show_config(Extension(config): Extension<Config>) -> impl IntoResponse {
    config.serialize_pretty()
}

async fn show_version() -> impl IntoResponse {
    format!("Serial Sense v{}\n", env!("CARGO_PKG_VERSION"))
}
