//! Streaming sessions
//!
//! A [`StreamSession`] owns one upstream device connection, live or replay,
//! and fans its output out to every attached client sink:
//!
//! ```text
//!   device ──► open (live.rs / replay.rs) ──► pump task
//!                                               │ fan-out, arrival order
//!                   ┌───────────────────────────┼───────────────┐
//!                   ▼                           ▼               ▼
//!              [ClientSink]               [ClientSink]     [ClientSink]
//! ```
//!
//! Live sessions forward raw chunks verbatim; replay sessions run chunks
//! through the [`crate::mjpeg::FrameDemuxer`] and fan out multipart-wrapped
//! frames. Sessions are created and owned exclusively by the
//! [`crate::registry::StreamRegistry`]; nothing in here touches the
//! registry's session map directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{OwnedSemaphorePermit, RwLock};
use tokio::task::JoinHandle;

use crate::device::ByteStream;
use crate::mjpeg::FrameDemuxer;
use crate::registry::StreamId;
use crate::stats::{FinalStats, SessionSnapshot};

pub mod live;
pub mod replay;
pub mod sink;
pub mod state;

pub use sink::{ChannelSink, ClientSink, SinkClosed, SinkId};
pub use state::{SessionPhase, Settle};

use std::sync::Arc;

/// Kind of upstream a session proxies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Live,
    Replay,
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKind::Live => write!(f, "live"),
            SessionKind::Replay => write!(f, "replay"),
        }
    }
}

/// Result of a successful session open, handed to the registry
///
/// `initial` holds payloads observed while proving the open succeeded (the
/// live first chunk, or the replay frames demuxed so far, already wrapped
/// as multipart parts). The registry attaches the requesting client's sink
/// first and flushes these afterwards, so the requester never misses the
/// session's first frame.
pub(crate) struct OpenedUpstream {
    pub content_type: Option<String>,
    pub initial: Vec<Bytes>,
    pub body: ByteStream,
    /// Demuxer carrying the unconsumed tail; replay only
    pub demux: Option<FrameDemuxer>,
    pub bytes_so_far: u64,
    pub frames_so_far: u64,
}

// Manual impl; the body stream is opaque.
impl std::fmt::Debug for OpenedUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedUpstream")
            .field("content_type", &self.content_type)
            .field("initial", &self.initial.len())
            .field("bytes_so_far", &self.bytes_so_far)
            .field("frames_so_far", &self.frames_so_far)
            .finish_non_exhaustive()
    }
}

/// One active streaming session
pub struct StreamSession {
    id: StreamId,
    kind: SessionKind,
    content_type: Option<String>,
    created_at: Instant,
    sinks: RwLock<HashMap<SinkId, Arc<dyn ClientSink>>>,
    next_sink: AtomicU64,
    bytes: AtomicU64,
    frames: AtomicU64,
    settle: Settle,
    pump: Mutex<Option<JoinHandle<()>>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

impl StreamSession {
    pub(crate) fn new(
        id: StreamId,
        kind: SessionKind,
        content_type: Option<String>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            id,
            kind,
            content_type,
            created_at: Instant::now(),
            sinks: RwLock::new(HashMap::new()),
            next_sink: AtomicU64::new(1),
            bytes: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            settle: Settle::new(),
            pump: Mutex::new(None),
            watchers: Mutex::new(Vec::new()),
            permit: Mutex::new(Some(permit)),
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Content type negotiated with the device (live) or imposed by the
    /// gateway (replay multipart)
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub(crate) fn settle(&self) -> &Settle {
        &self.settle
    }

    /// Attach a sink; it receives only data delivered after this point
    pub(crate) async fn attach(&self, sink: Arc<dyn ClientSink>) -> SinkId {
        let sink_id = SinkId(self.next_sink.fetch_add(1, Ordering::Relaxed));
        self.sinks.write().await.insert(sink_id, sink);

        tracing::debug!(session = %self.id, sink = %sink_id, "Client attached");
        sink_id
    }

    /// Remove a sink; returns how many remain attached
    pub(crate) async fn detach(&self, sink_id: SinkId) -> usize {
        let mut sinks = self.sinks.write().await;
        if sinks.remove(&sink_id).is_some() {
            tracing::debug!(
                session = %self.id,
                sink = %sink_id,
                remaining = sinks.len(),
                "Client detached"
            );
        }
        sinks.len()
    }

    pub async fn client_count(&self) -> usize {
        self.sinks.read().await.len()
    }

    /// Write one payload to every attached sink, in attach order by id
    ///
    /// A failed write is logged and the sink left in place: removal is the
    /// exclusive business of that sink's own close event, and one broken
    /// client must never stall fan-out to the others.
    pub(crate) async fn deliver(&self, payload: Bytes) {
        let targets: Vec<(SinkId, Arc<dyn ClientSink>)> = {
            let sinks = self.sinks.read().await;
            let mut v: Vec<_> = sinks.iter().map(|(id, s)| (*id, Arc::clone(s))).collect();
            v.sort_by_key(|(id, _)| id.0);
            v
        };

        for (sink_id, sink) in targets {
            if sink.send(payload.clone()).await.is_err() {
                tracing::warn!(
                    session = %self.id,
                    sink = %sink_id,
                    "Sink write failed; leaving removal to its close event"
                );
            }
        }
    }

    pub(crate) fn add_bytes(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_frames(&self, n: u64) {
        self.frames.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn set_pump(&self, handle: JoinHandle<()>) {
        *self.pump.lock().unwrap() = Some(handle);
    }

    pub(crate) fn take_pump(&self) -> Option<JoinHandle<()>> {
        self.pump.lock().unwrap().take()
    }

    pub(crate) fn track_watcher(&self, handle: JoinHandle<()>) {
        self.watchers.lock().unwrap().push(handle);
    }

    /// Gracefully end every sink and drop the attachment set
    pub(crate) async fn finish_sinks(&self) {
        for watcher in self.watchers.lock().unwrap().drain(..) {
            watcher.abort();
        }

        let sinks: Vec<Arc<dyn ClientSink>> = {
            let mut map = self.sinks.write().await;
            map.drain().map(|(_, s)| s).collect()
        };
        for sink in sinks {
            sink.finish().await;
        }
    }

    pub(crate) fn release_permit(&self) {
        let _ = self.permit.lock().unwrap().take();
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            content_type: self.content_type.clone(),
            clients: self.client_count().await,
            bytes: self.bytes.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            uptime: self.created_at.elapsed(),
        }
    }

    pub(crate) fn final_stats(&self) -> FinalStats {
        FinalStats {
            duration: self.created_at.elapsed(),
            bytes: self.bytes.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
        }
    }
}
