use color_eyre::Result;
use common::{expect_error, expect_ok, start_server, start_server_without_mock};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{json, Value};
use serial_sense::{
    actions::{
        ConnectRequest, ConnectResponse, DetectionReport, DisconnectResponse, HealthStatus,
        MonitorReport, ServiceInfo,
    },
    config::Config,
    device::{DataFormat, DeviceCategory, DeviceDescriptor, FormatHint},
    error::Error,
    mock,
    normalize::SensorReading,
};

mod common;

#[tokio::test]
async fn root_describes_service() -> Result<()> {
    let server = start_server().await;

    let info: ServiceInfo = server.get_ok("/").await?;

    assert_eq!(info.name, "Serial Sense");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    assert!(info.endpoints.contains_key("GET /data"));

    Ok(())
}

#[tokio::test]
async fn version() -> Result<()> {
    let server = start_server().await;

    let version = server.get("/version").await?.text().await?;
    assert!(version.contains(env!("CARGO_PKG_VERSION")));

    Ok(())
}

#[tokio::test]
async fn config_is_shown_as_ron() -> Result<()> {
    let server = start_server().await;

    let body = server.get("/config").await?.text().await?;
    let config = Config::deserialize(&body)?;

    assert!(config.force_mock);

    Ok(())
}

#[tokio::test]
async fn health_before_anything() -> Result<()> {
    let server = start_server().await;

    let health: HealthStatus = server.get_ok("/health").await?;

    assert_eq!(health.status, "healthy");
    assert!(!health.device_connected);
    assert!(health.connected_device.is_none());
    assert!(health.is_mock);
    assert_eq!(health.total_connections, 0);

    Ok(())
}

#[tokio::test]
async fn devices_in_mock_mode() -> Result<()> {
    let server = start_server().await;

    let devices: Vec<DeviceDescriptor> = server.get_ok("/devices").await?;

    assert_eq!(devices, mock::mock_devices());
    assert!(devices
        .iter()
        .any(|device| device.device_type == DeviceCategory::UsbBridge));

    Ok(())
}

#[tokio::test]
async fn connect_then_read() -> Result<()> {
    let server = start_server().await;

    let connected: ConnectResponse = expect_ok(
        server
            .post_json("/connect", &ConnectRequest::path(mock::CP2102_PATH))
            .await?,
    )
    .await?;

    assert_eq!(connected.connection.device.device, mock::CP2102_PATH);
    assert_eq!(connected.connection.baud_rate, 115_200);
    assert!(connected.connection.is_mock);

    let reading: SensorReading = server.get_ok("/data").await?;

    assert_eq!(reading.device.as_deref(), Some(mock::CP2102_PATH));
    assert_eq!(reading.data_type, DataFormat::Json);
    let temp = reading.temp.expect("Mock readings carry a temperature");
    assert!(mock::TEMPERATURE.contains(&temp), "{temp}");

    Ok(())
}

#[tokio::test]
async fn connect_shows_in_listing_and_health() -> Result<()> {
    let server = start_server().await;

    expect_ok::<ConnectResponse>(
        server
            .post_json("/connect", &ConnectRequest::path(mock::SENSOR_PATH))
            .await?,
    )
    .await?;

    let devices: Vec<DeviceDescriptor> = server.get_ok("/devices").await?;
    let connected = devices
        .iter()
        .filter(|device| device.is_connected)
        .map(|device| device.device.as_str())
        .collect::<Vec<_>>();
    assert_eq!(connected, vec![mock::SENSOR_PATH]);

    let health: HealthStatus = server.get_ok("/health").await?;
    assert_eq!(health.connected_device.as_deref(), Some(mock::SENSOR_PATH));
    assert_eq!(health.total_connections, 1);
    assert!(health.last_connection_attempt.unwrap().success);

    Ok(())
}

#[tokio::test]
async fn connect_without_body_auto_selects() -> Result<()> {
    let server = start_server().await;

    let connected: ConnectResponse = server.post_ok("/connect").await?;

    assert_eq!(connected.connection.device.device, mock::CP2102_PATH);

    Ok(())
}

#[tokio::test]
async fn connect_unknown_path() -> Result<()> {
    let server = start_server().await;

    let response = server
        .post_json("/connect", &ConnectRequest::path("/dev/ttyNOPE"))
        .await?;
    let body = expect_error(response, StatusCode::BAD_REQUEST).await?;

    let (path, _) = body.error.try_into_connection().unwrap();
    assert_eq!(path, "/dev/ttyNOPE");

    let health: HealthStatus = server.get_ok("/health").await?;
    let attempt = health.last_connection_attempt.unwrap();
    assert!(!attempt.success);
    assert!(attempt.error.is_some());

    Ok(())
}

#[tokio::test]
async fn connect_with_malformed_body_is_bad_usage() -> Result<()> {
    let server = start_server().await;

    for body in [r#"{"device_path": 5}"#, "not json at all"] {
        let response = server.post_raw("/connect", body).await?;
        let error = expect_error(response, StatusCode::BAD_REQUEST).await?;

        assert!(matches!(error.error, Error::BadUsage(_)), "{body}");
    }

    // Nothing was connected along the way.
    let health: HealthStatus = server.get_ok("/health").await?;
    assert!(!health.device_connected);
    assert_eq!(health.total_connections, 0);

    Ok(())
}

#[tokio::test]
async fn connect_with_zero_baud_is_bad_usage() -> Result<()> {
    let server = start_server().await;

    let response = server
        .post_json("/connect", &json!({"device_path": mock::CP2102_PATH, "baudrate": 0}))
        .await?;
    let body = expect_error(response, StatusCode::BAD_REQUEST).await?;

    assert!(matches!(body.error, Error::BadUsage(_)));

    Ok(())
}

#[tokio::test]
async fn read_with_format_override() -> Result<()> {
    let server = start_server().await;

    expect_ok::<ConnectResponse>(
        server
            .post_json(
                "/connect",
                &ConnectRequest::path(mock::CP2102_PATH).with_format(FormatHint::Json),
            )
            .await?,
    )
    .await?;

    let reading: SensorReading = server.get_ok("/data?data_format=binary").await?;

    assert_eq!(reading.data_type, DataFormat::Binary);
    assert!(reading.formatted_data.is_empty());
    assert!(reading.temp.is_none());

    Ok(())
}

#[tokio::test]
async fn disconnect_then_disconnect_again() -> Result<()> {
    let server = start_server().await;

    expect_ok::<ConnectResponse>(
        server
            .post_json("/connect", &ConnectRequest::path(mock::CP2102_PATH))
            .await?,
    )
    .await?;

    let first: DisconnectResponse = server.post_ok("/disconnect").await?;
    assert_eq!(
        first.previous.map(|info| info.device.device),
        Some(mock::CP2102_PATH.to_string())
    );

    let second: DisconnectResponse = server.post_ok("/disconnect").await?;
    assert!(second.previous.is_none());
    assert_eq!(second.message, "No device was connected");

    Ok(())
}

#[tokio::test]
async fn forced_mock_reads_without_connection() -> Result<()> {
    let server = start_server().await;

    let reading: SensorReading = server.get_ok("/data").await?;

    assert!(reading.is_parsed());
    assert!(reading.temp.is_some());

    Ok(())
}

#[tokio::test]
async fn read_without_connection_is_bad_request() -> Result<()> {
    let server = start_server_without_mock().await;

    let body = expect_error(server.get("/data").await?, StatusCode::BAD_REQUEST).await?;

    assert_eq!(body.error, Error::NotConnected);
    assert!(body.detail.contains("/connect"));

    Ok(())
}

#[tokio::test]
async fn auto_detect_connects_to_best() -> Result<()> {
    let server = start_server().await;

    let report: DetectionReport = server.get_ok("/auto-detect").await?;

    assert_eq!(report.detected_devices.len(), mock::mock_devices().len());
    assert_eq!(
        report.recommended_device.map(|device| device.device),
        Some(mock::CP2102_PATH.to_string())
    );
    assert!(report.auto_connected);
    assert!(report.error.is_none());

    Ok(())
}

#[tokio::test]
async fn usb_inserted_connects_then_moves_on() -> Result<()> {
    let server = start_server().await;

    let first: Value = server.post_ok("/usb-inserted").await?;
    assert_eq!(first["status"], "connected");
    assert_eq!(first["connection"]["device"]["device"], mock::CP2102_PATH);

    // The first device is taken, so the next one is picked.
    let second: Value = server.post_ok("/usb-inserted").await?;
    assert_eq!(second["status"], "connected");
    assert_eq!(second["connection"]["device"]["device"], mock::SENSOR_PATH);

    Ok(())
}

#[tokio::test]
async fn monitor_auto_connects_once() -> Result<()> {
    let server = start_server().await;

    let first: MonitorReport = server.get_ok("/monitor-usb").await?;
    assert_eq!(
        first.auto_connected.map(|info| info.device.device),
        Some(mock::CP2102_PATH.to_string())
    );
    assert_eq!(first.connected_device.as_deref(), Some(mock::CP2102_PATH));

    let second: MonitorReport = server.get_ok("/monitor-usb").await?;
    assert!(second.auto_connected.is_none());
    assert_eq!(
        second.available_for_connection,
        vec![mock::SENSOR_PATH.to_string()]
    );

    Ok(())
}
