//! Device access layer
//!
//! Everything that talks to an NVR or multidetector unit lives here:
//!
//! - [`endpoint`] builds the CGI request URLs the devices understand
//! - [`DeviceTransport`] is the seam between the gateway and the network,
//!   so sessions can be driven by scripted fake devices in tests
//! - [`transport`] is the production implementation over reqwest
//! - [`client`] is the single-shot accessor with silence-based completion
//!
//! The devices this gateway targets predate well-behaved HTTP: responses
//! carry no reliable length, and the transport connection is frequently left
//! open after the logical response is complete. Nothing in this module may
//! assume a response ends with a connection close.

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

pub mod client;
pub mod endpoint;
pub mod transport;

pub use client::{DeviceHttpClient, FetchResponse};
pub use endpoint::{DeviceEndpoint, ReplaySpeed, Resolution, StreamFormat};
pub use transport::HttpDeviceTransport;

use crate::error::Result;

/// A chunked response body from a device
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Response to a device request, before the body has been consumed
pub struct DeviceResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Negotiated content type, if the device sent one
    pub content_type: Option<String>,
    /// The body as a chunk stream; dropping it tears down the connection
    pub body: ByteStream,
}

/// Transport seam for device requests
///
/// The production implementation is [`HttpDeviceTransport`]. Tests substitute
/// scripted fakes to simulate the devices' pathological behaviors: bodies
/// that trickle, connections that never close, replies that never arrive.
#[async_trait::async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Issue a GET to the device and return the response with its body
    /// still streaming
    async fn open(&self, url: &str) -> Result<DeviceResponse>;
}

#[cfg(test)]
pub mod testing {
    //! Scripted fake devices for tests

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::sync::Mutex;

    use super::*;
    use crate::error::GatewayError;

    /// One scripted event in a fake device body
    #[derive(Clone)]
    pub enum BodyEvent {
        /// Deliver a chunk
        Chunk(Bytes),
        /// Wait before the next event
        Delay(Duration),
        /// Fail the stream with an I/O error
        Error(String),
        /// Keep the connection open forever without sending anything
        Hang,
    }

    /// A scripted device response
    #[derive(Clone)]
    pub struct Script {
        pub status: u16,
        pub content_type: Option<String>,
        pub events: Vec<BodyEvent>,
    }

    impl Script {
        /// 200 response that delivers the given chunks back to back then closes
        pub fn ok(chunks: Vec<Bytes>) -> Self {
            Self {
                status: 200,
                content_type: Some("image/jpeg".to_string()),
                events: chunks.into_iter().map(BodyEvent::Chunk).collect(),
            }
        }

        /// 200 response that accepts the request and then goes silent forever
        pub fn silent() -> Self {
            Self {
                status: 200,
                content_type: None,
                events: vec![BodyEvent::Hang],
            }
        }

        /// Non-200 response carrying a device error body
        pub fn error(status: u16, body: &str) -> Self {
            Self {
                status,
                content_type: Some("text/plain".to_string()),
                events: vec![BodyEvent::Chunk(Bytes::copy_from_slice(body.as_bytes()))],
            }
        }
    }

    /// Fake transport replaying scripted responses in order
    ///
    /// Counts the requests it serves so tests can assert that certain
    /// failures (capacity, unknown id) happen with zero network calls.
    pub struct FakeTransport {
        scripts: Mutex<Vec<Script>>,
        calls: AtomicUsize,
    }

    impl FakeTransport {
        pub fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts),
                calls: AtomicUsize::new(0),
            })
        }

        /// Number of requests served so far
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl DeviceTransport for FakeTransport {
        async fn open(&self, _url: &str) -> Result<DeviceResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let script = {
                let mut scripts = self.scripts.lock().await;
                if scripts.is_empty() {
                    return Err(GatewayError::DeviceUnreachable(
                        "fake transport script exhausted".to_string(),
                    ));
                }
                scripts.remove(0)
            };

            let body = futures::stream::unfold(
                script.events.into_iter(),
                |mut events| async move {
                    loop {
                        match events.next() {
                            Some(BodyEvent::Chunk(bytes)) => return Some((Ok(bytes), events)),
                            Some(BodyEvent::Delay(d)) => tokio::time::sleep(d).await,
                            Some(BodyEvent::Error(msg)) => {
                                return Some((
                                    Err(std::io::Error::new(std::io::ErrorKind::Other, msg)),
                                    events,
                                ))
                            }
                            Some(BodyEvent::Hang) => futures::future::pending::<()>().await,
                            None => return None,
                        }
                    }
                },
            );

            let headers = script
                .content_type
                .iter()
                .map(|ct| ("Content-Type".to_string(), ct.clone()))
                .collect();

            Ok(DeviceResponse {
                status: script.status,
                headers,
                content_type: script.content_type,
                body: Box::pin(body),
            })
        }
    }
}
