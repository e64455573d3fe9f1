#![allow(dead_code)]

use color_eyre::Result;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serial_sense::{config::Config, error::ErrorBody};
use tokio::sync::oneshot;
use tracing::info;

pub struct TestServer {
    base_url: String,
    client: Client,
}

pub async fn start_server() -> TestServer {
    start_server_with_config(Config {
        force_mock: true,
        ..Default::default()
    })
    .await
}

/// Lists real ports, so only deterministic for things which never enumerate.
pub async fn start_server_without_mock() -> TestServer {
    start_server_with_config(Config {
        force_mock: false,
        serial_mock_fallback: false,
        read_timeout_ms: 100,
        ..Default::default()
    })
    .await
}

pub async fn start_server_with_config(config: Config) -> TestServer {
    let (port_tx, port_rx) = oneshot::channel();

    tokio::spawn(async move { serial_sense::server::run_any_port(config, port_tx).await });
    let port = port_rx
        .await
        .expect("Server should reply with allocated port");

    info!("Server on port {port}");

    TestServer {
        base_url: format!("http://127.0.0.1:{port}"),
        client: Client::new(),
    }
}

impl TestServer {
    pub fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    pub async fn get(&self, route: &str) -> Result<Response> {
        Ok(self.client.get(self.url(route)).send().await?)
    }

    pub async fn post(&self, route: &str) -> Result<Response> {
        Ok(self.client.post(self.url(route)).send().await?)
    }

    pub async fn post_json<B: serde::Serialize>(&self, route: &str, body: &B) -> Result<Response> {
        Ok(self.client.post(self.url(route)).json(body).send().await?)
    }

    pub async fn post_raw(&self, route: &str, body: &'static str) -> Result<Response> {
        Ok(self
            .client
            .post(self.url(route))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await?)
    }

    /// GET, expecting success.
    pub async fn get_ok<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        expect_ok(self.get(route).await?).await
    }

    /// POST without a body, expecting success.
    pub async fn post_ok<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        expect_ok(self.post(route).await?).await
    }
}

pub async fn expect_ok<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await?;
        return Err(color_eyre::eyre::eyre!("Status {status}: {body}"));
    }

    Ok(response.json().await?)
}

pub async fn expect_error(response: Response, expected: StatusCode) -> Result<ErrorBody> {
    assert_eq!(response.status(), expected);

    Ok(response.json().await?)
}
