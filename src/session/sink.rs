//! Downstream client sinks
//!
//! A [`ClientSink`] is a write-capable, closable consumer of stream output.
//! Its lifetime is owned by the external transport layer (the HTTP routing
//! code holding the client response); the session core only needs to write
//! to it, end it gracefully on stop, and notice when it goes away.
//!
//! Write failures are the sink's own problem: they are reported to the
//! caller for logging but must never remove the sink (only its close event
//! does that) and never affect sibling sinks on the same session.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Per-session handle for an attached sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(pub(crate) u64);

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// The downstream consumer went away
#[derive(Debug, thiserror::Error)]
#[error("client sink closed")]
pub struct SinkClosed;

/// A downstream consumer of session output
#[async_trait::async_trait]
pub trait ClientSink: Send + Sync {
    /// Write one payload to the client
    async fn send(&self, chunk: Bytes) -> Result<(), SinkClosed>;

    /// End the stream gracefully so buffered output flushes
    async fn finish(&self);

    /// Resolves when the downstream client disconnects or errors
    async fn closed(&self);
}

/// Channel-backed sink for HTTP response bodies
///
/// The routing layer drains the returned receiver into the client response;
/// dropping the receiver is the close signal that detaches the sink from
/// its session.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport layer drains
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait::async_trait]
impl ClientSink for ChannelSink {
    async fn send(&self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(chunk).await.map_err(|_| SinkClosed)
    }

    async fn finish(&self) {
        // Nothing buffered on this side; the session dropping its handle
        // closes the channel and lets the receiver drain what is queued.
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new(4);

        sink.send(Bytes::from_static(b"one")).await.unwrap();
        sink.send(Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_channel_sink_close_detection() {
        let (sink, rx) = ChannelSink::new(4);

        drop(rx);
        // closed() resolves once the receiver is gone
        sink.closed().await;
        assert!(sink.send(Bytes::from_static(b"x")).await.is_err());
    }

    #[tokio::test]
    async fn test_collecting_sink_close() {
        let sink = testing::CollectingSink::new();

        sink.send(Bytes::from_static(b"a")).await.unwrap();
        sink.close();
        sink.closed().await;
        assert!(sink.send(Bytes::from_static(b"b")).await.is_err());
        assert_eq!(sink.received(), b"a");
    }
}
