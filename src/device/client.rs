//! Single-shot device accessor with silence-based completion detection
//!
//! The target devices often keep the transport connection open after the
//! logical response is complete, so "read until close" blocks indefinitely.
//! [`DeviceHttpClient::fetch`] instead declares the response complete when
//! any of the following fires first:
//!
//! 1. the device closes the connection
//! 2. no new bytes arrive for the silence window, after at least one byte
//! 3. the hard ceiling elapses since the request started
//!
//! The connection is then dropped and the buffered bytes concatenated into
//! the final body. This heuristic trades a fixed latency tax per request for
//! reliability against non-conformant devices.
//!
//! A device that trickles bytes slower than the silence window keeps the
//! request alive until the hard ceiling. That is intentional tolerance for
//! slow devices, not a bug to fix.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::time::{timeout_at, Instant};

use super::{ByteStream, DeviceTransport};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Default silence window
pub const DEFAULT_SILENCE_WINDOW: Duration = Duration::from_millis(500);
/// Default hard ceiling
pub const DEFAULT_MAX_WINDOW: Duration = Duration::from_secs(10);

/// A fully collected device response
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Concatenated body bytes
    pub body: Bytes,
}

impl FetchResponse {
    /// Look up a header value, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Single-request device accessor
pub struct DeviceHttpClient {
    transport: Arc<dyn DeviceTransport>,
    silence_window: Duration,
    max_window: Duration,
}

impl DeviceHttpClient {
    /// Build a client with the default windows (500 ms silence, 10 s max)
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            transport,
            silence_window: DEFAULT_SILENCE_WINDOW,
            max_window: DEFAULT_MAX_WINDOW,
        }
    }

    /// Build a client taking its windows from the gateway configuration
    pub fn from_config(transport: Arc<dyn DeviceTransport>, config: &GatewayConfig) -> Self {
        Self {
            transport,
            silence_window: config.fetch_silence_window,
            max_window: config.fetch_max_window,
        }
    }

    /// Fetch a device URL with the client's configured windows
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.fetch_with(url, self.silence_window, self.max_window)
            .await
    }

    /// Fetch a device URL with explicit silence and ceiling windows
    ///
    /// Non-200 responses fail with [`GatewayError::DeviceError`] after the
    /// full error body has been collected, since devices report diagnostics
    /// there. A connection that produces zero bytes within the ceiling fails
    /// with [`GatewayError::DeviceTimeout`].
    pub async fn fetch_with(
        &self,
        url: &str,
        silence_window: Duration,
        max_window: Duration,
    ) -> Result<FetchResponse> {
        let started = Instant::now();
        let response = self.transport.open(url).await?;

        let status = response.status;
        let headers = response.headers;

        let body = collect_body(
            response.body,
            silence_window,
            started + max_window,
            max_window,
        )
        .await?;

        if status != 200 {
            return Err(GatewayError::DeviceError {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        tracing::debug!(
            url = url,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Device fetch complete"
        );

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}

/// Collect a device body until close, silence, or the deadline
///
/// Shared by [`DeviceHttpClient`] and by session opens that need to gather a
/// non-200 error body from a connection that may never close.
pub(crate) async fn collect_body(
    mut body: ByteStream,
    silence_window: Duration,
    deadline: Instant,
    max_window: Duration,
) -> Result<Bytes> {
    let mut buf = BytesMut::new();

    loop {
        // The silence window only arms once the first byte has arrived;
        // before that, only the hard ceiling applies.
        let wake = if buf.is_empty() {
            deadline
        } else {
            deadline.min(Instant::now() + silence_window)
        };

        match timeout_at(wake, body.next()).await {
            Ok(Some(Ok(chunk))) => {
                buf.extend_from_slice(&chunk);
            }
            // Device closed the connection: the body is whatever arrived.
            Ok(None) => return Ok(buf.freeze()),
            // Transport error mid-body. With bytes in hand, treat it like a
            // close; these devices routinely reset instead of closing.
            Ok(Some(Err(e))) => {
                if buf.is_empty() {
                    return Err(GatewayError::DeviceUnreachable(e.to_string()));
                }
                tracing::debug!(error = %e, "Transport error after partial body; completing");
                return Ok(buf.freeze());
            }
            Err(_) => {
                if buf.is_empty() {
                    // Ceiling elapsed with zero activity.
                    return Err(GatewayError::DeviceTimeout(max_window));
                }
                // Silence window or ceiling: either way the response is done.
                return Ok(buf.freeze());
            }
        }
    }
}

/// Collect a non-200 error body for diagnostics
///
/// Same bounded read as a normal fetch, but never fails: a device that
/// hangs instead of delivering its error page just yields an empty string.
pub(crate) async fn collect_error_body(
    body: ByteStream,
    silence_window: Duration,
    deadline: Instant,
) -> String {
    match collect_body(body, silence_window, deadline, Duration::ZERO).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}
