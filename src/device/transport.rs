//! Production device transport over reqwest
//!
//! Devices are plain HTTP or TLS-wrapped depending on the base URL scheme.
//! Certificate validation can be disabled for the self-signed certificates
//! found on internal units; that is an explicit operational setting, never
//! the default.

use futures::TryStreamExt;

use super::{DeviceResponse, DeviceTransport};
use crate::error::{GatewayError, Result};

/// reqwest-backed transport for real devices
pub struct HttpDeviceTransport {
    client: reqwest::Client,
}

impl HttpDeviceTransport {
    /// Build a transport
    ///
    /// No total request timeout is configured on the client: the gateway's
    /// silence windows and watchdogs own all timing decisions, and a
    /// client-level timeout would cut long-lived live streams short.
    pub fn new(accept_invalid_certs: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| GatewayError::DeviceUnreachable(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl DeviceTransport for HttpDeviceTransport {
    async fn open(&self, url: &str) -> Result<DeviceResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::DeviceUnreachable(e.to_string()))?;

        let status = response.status().as_u16();

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();

        let content_type = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone());

        let body = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

        Ok(DeviceResponse {
            status,
            headers,
            content_type,
            body: Box::pin(body),
        })
    }
}
