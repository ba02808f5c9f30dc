//! Live session open
//!
//! Opens one long-lived connection to a device's live-image endpoint. The
//! open only counts as successful once the first body chunk is actually
//! observed: an accepted request proves nothing with these devices, real
//! content does. After that the session is pure passthrough; chunks are
//! forwarded verbatim with no buffering or parsing.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{timeout, Instant};

use super::OpenedUpstream;
use crate::device::client::{collect_error_body, DEFAULT_SILENCE_WINDOW};
use crate::device::DeviceTransport;
use crate::error::{GatewayError, Result};

/// Open a live upstream and wait for proof of content
pub(crate) async fn open_live(
    transport: &Arc<dyn DeviceTransport>,
    url: &str,
    start_timeout: Duration,
) -> Result<OpenedUpstream> {
    let response = transport.open(url).await?;

    if response.status != 200 {
        let body = collect_error_body(
            response.body,
            DEFAULT_SILENCE_WINDOW,
            Instant::now() + start_timeout,
        )
        .await;
        return Err(GatewayError::DeviceError {
            status: response.status,
            body,
        });
    }

    let mut body = response.body;

    let first = match timeout(start_timeout, body.next()).await {
        Ok(Some(Ok(chunk))) => chunk,
        Ok(Some(Err(e))) => return Err(GatewayError::DeviceUnreachable(e.to_string())),
        Ok(None) => {
            return Err(GatewayError::DeviceUnreachable(
                "device closed the connection before sending any content".to_string(),
            ))
        }
        // Handshake accepted but zero bytes within the window
        Err(_) => return Err(GatewayError::DeviceTimeout(start_timeout)),
    };

    tracing::debug!(url = url, first_chunk = first.len(), "Live stream started");

    let bytes_so_far = first.len() as u64;
    Ok(OpenedUpstream {
        content_type: response.content_type,
        initial: vec![first],
        body,
        demux: None,
        bytes_so_far,
        frames_so_far: 0,
    })
}
