//! nvr-gateway: streaming gateway for legacy NVR and multidetector devices
//!
//! The target devices expose their media over HTTP CGI endpoints, but with
//! none of the usual HTTP response semantics: no reliable content lengths,
//! connections held open long after a response is logically complete, and
//! replay bodies that are raw concatenated JPEG images with no framing.
//! This crate turns those endpoints into well-behaved streams:
//!
//! - [`registry::StreamRegistry`] creates, tracks and tears down sessions,
//!   multiplexing one upstream device connection to any number of
//!   downstream clients
//! - live sessions forward the device's stream verbatim; replay sessions
//!   demux JPEG frames ([`mjpeg::FrameDemuxer`]) and re-emit them as
//!   `multipart/x-mixed-replace` parts browsers can render
//! - [`device::DeviceHttpClient`] handles single-shot device requests with
//!   silence-based completion, since the devices never signal end-of-response
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nvr_gateway::{
//!     ChannelSink, DeviceEndpoint, GatewayConfig, HttpDeviceTransport, LiveOptions,
//!     StreamRegistry,
//! };
//!
//! # async fn run() -> nvr_gateway::Result<()> {
//! let config = GatewayConfig::default();
//! let transport = Arc::new(HttpDeviceTransport::new(config.accept_invalid_certs)?);
//! let registry = StreamRegistry::new(config, transport);
//!
//! let device = DeviceEndpoint::new("http://192.168.8.20");
//! let (sink, mut rx) = ChannelSink::new(64);
//! let id = registry
//!     .create_live(&device, 1, LiveOptions::default(), sink)
//!     .await?;
//!
//! while let Some(chunk) = rx.recv().await {
//!     // forward to the client response
//!     let _ = chunk;
//! }
//! registry.stop(&id).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod mjpeg;
pub mod registry;
pub mod session;
pub mod stats;

pub use config::GatewayConfig;
pub use device::{
    DeviceEndpoint, DeviceHttpClient, DeviceResponse, DeviceTransport, FetchResponse,
    HttpDeviceTransport, ReplaySpeed, Resolution, StreamFormat,
};
pub use error::{GatewayError, Result};
pub use mjpeg::FrameDemuxer;
pub use registry::{LiveOptions, ReplayOptions, SessionEvent, StreamId, StreamRegistry};
pub use session::{ChannelSink, ClientSink, SessionKind, SinkClosed, StreamSession};
pub use stats::{FinalStats, RegistryStats, SessionSnapshot};
