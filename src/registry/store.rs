//! Registry implementation
//!
//! The central owner of all active streaming sessions. Creation is
//! capacity-gated before any device I/O; teardown is idempotent and always
//! flows through [`StreamRegistry::stop`] (or its internal equivalent), so
//! upstream sockets are released eagerly and exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, RwLock, Semaphore};

use super::events::SessionEvent;
use super::StreamId;
use crate::config::GatewayConfig;
use crate::device::endpoint::{DeviceEndpoint, ReplaySpeed, Resolution, StreamFormat};
use crate::device::{ByteStream, DeviceTransport};
use crate::error::{GatewayError, Result};
use crate::mjpeg::{multipart, FrameDemuxer};
use crate::session::{
    live, replay, ClientSink, OpenedUpstream, SessionKind, SessionPhase, StreamSession,
};
use crate::stats::{RegistryStats, SessionSnapshot};

/// Options for a live session
#[derive(Debug, Clone, Copy)]
pub struct LiveOptions {
    pub resolution: Resolution,
    pub format: StreamFormat,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::Hi,
            format: StreamFormat::Mjpeg,
        }
    }
}

/// Options for a replay session
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Requested jog multiplier; unsupported values normalize to 1x
    pub speed: i32,
}

impl ReplayOptions {
    pub fn speed(speed: i32) -> Self {
        Self { speed }
    }
}

/// Central registry for all active streaming sessions
pub struct StreamRegistry {
    config: GatewayConfig,
    transport: Arc<dyn DeviceTransport>,
    sessions: RwLock<HashMap<StreamId, Arc<StreamSession>>>,
    capacity: Arc<Semaphore>,
    events: broadcast::Sender<SessionEvent>,
    next_seq: AtomicU64,
    total_created: AtomicU64,
    total_failed: AtomicU64,
}

impl StreamRegistry {
    /// Create a registry over the given device transport
    pub fn new(config: GatewayConfig, transport: Arc<dyn DeviceTransport>) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity);

        Arc::new(Self {
            capacity: Arc::new(Semaphore::new(config.max_sessions)),
            config,
            transport,
            sessions: RwLock::new(HashMap::new()),
            events,
            next_seq: AtomicU64::new(1),
            total_created: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        })
    }

    /// Subscribe to lifecycle notifications
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The registry configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Open a live session and attach the requesting client's sink
    ///
    /// Resolves once the first body chunk has been observed; that chunk is
    /// delivered to the requesting sink, which attaches before any data
    /// flows downstream.
    pub async fn create_live(
        self: &Arc<Self>,
        device: &DeviceEndpoint,
        camera: u32,
        options: LiveOptions,
        sink: Arc<dyn ClientSink>,
    ) -> Result<StreamId> {
        let permit = self.acquire_slot().await?;

        let url = device.live_url(camera, options.resolution, options.format);
        let opened = match live::open_live(&self.transport, &url, self.config.live_start_timeout)
            .await
        {
            Ok(opened) => opened,
            Err(e) => {
                self.total_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(device = device.host(), camera = camera, error = %e, "Live open failed");
                return Err(e);
            }
        };

        let id = self.mint_id(SessionKind::Live, device, camera, None);
        self.install_session(id, SessionKind::Live, opened, permit, sink)
            .await
    }

    /// Open a replay session and attach the requesting client's sink
    ///
    /// Resolves once the first complete frame has been demuxed; the frames
    /// demuxed so far are delivered to the requesting sink after it
    /// attaches, so it never misses the session's first frame.
    pub async fn create_replay(
        self: &Arc<Self>,
        device: &DeviceEndpoint,
        camera: u32,
        timestamp: u64,
        options: ReplayOptions,
        sink: Arc<dyn ClientSink>,
    ) -> Result<StreamId> {
        let permit = self.acquire_slot().await?;

        let url = device.replay_url(camera, timestamp, ReplaySpeed::new(options.speed));
        let opened = match replay::open_replay(&self.transport, &url, self.config.replay_watchdog)
            .await
        {
            Ok(opened) => opened,
            Err(e) => {
                self.total_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    device = device.host(),
                    camera = camera,
                    timestamp = timestamp,
                    error = %e,
                    "Replay open failed"
                );
                return Err(e);
            }
        };

        let id = self.mint_id(SessionKind::Replay, device, camera, Some(timestamp));
        self.install_session(id, SessionKind::Replay, opened, permit, sink)
            .await
    }

    /// Attach an additional client sink to a running session
    ///
    /// The sink receives only data delivered after attachment; there is no
    /// history replay. Returns false for an unknown session id.
    pub async fn attach_client(
        self: &Arc<Self>,
        id: &StreamId,
        sink: Arc<dyn ClientSink>,
    ) -> bool {
        let session = self.sessions.read().await.get(id).cloned();
        let Some(session) = session else {
            return false;
        };

        self.install_sink(&session, sink).await;
        true
    }

    /// Stop a session: destroy the upstream connection, gracefully end
    /// every sink, release resources and notify listeners
    ///
    /// Idempotent; returns false for an unknown id.
    pub async fn stop(&self, id: &StreamId) -> bool {
        self.finish_session(id, true).await
    }

    /// Stop a session, failing for unknown ids
    ///
    /// Same teardown as [`StreamRegistry::stop`]; the delete-by-id surface
    /// wants a typed not-found failure rather than a bool.
    pub async fn try_stop(&self, id: &StreamId) -> Result<()> {
        if self.finish_session(id, true).await {
            Ok(())
        } else {
            Err(GatewayError::StreamNotFound(id.clone()))
        }
    }

    /// Snapshot every active session
    pub async fn list_active(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<Arc<StreamSession>> =
            self.sessions.read().await.values().cloned().collect();

        let mut snapshots = Vec::with_capacity(sessions.len());
        for session in sessions {
            snapshots.push(session.snapshot().await);
        }
        snapshots
    }

    /// Registry-wide counters
    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            active: self.sessions.read().await.len(),
            max_sessions: self.config.max_sessions,
            total_created: self.total_created.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Stop every active session; used at process termination to release
    /// all device sockets
    pub async fn shutdown_all(&self) {
        let ids: Vec<StreamId> = self.sessions.read().await.keys().cloned().collect();

        tracing::info!(sessions = ids.len(), "Shutting down all sessions");
        for id in ids {
            self.finish_session(&id, true).await;
        }
    }

    async fn acquire_slot(&self) -> Result<tokio::sync::OwnedSemaphorePermit> {
        // The gate sits before any device I/O: a registry at capacity must
        // not so much as connect.
        match Arc::clone(&self.capacity).try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(_) => {
                let active = self.sessions.read().await.len();
                self.total_failed.fetch_add(1, Ordering::Relaxed);
                Err(GatewayError::CapacityExceeded {
                    active,
                    max: self.config.max_sessions,
                })
            }
        }
    }

    fn mint_id(
        &self,
        kind: SessionKind,
        device: &DeviceEndpoint,
        camera: u32,
        timestamp: Option<u64>,
    ) -> StreamId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        StreamId::new(kind, device.host(), camera, timestamp, seq)
    }

    /// Register a freshly opened session, attach the requesting sink,
    /// flush the initial payloads and start the pump
    async fn install_session(
        self: &Arc<Self>,
        id: StreamId,
        kind: SessionKind,
        opened: OpenedUpstream,
        permit: tokio::sync::OwnedSemaphorePermit,
        sink: Arc<dyn ClientSink>,
    ) -> Result<StreamId> {
        let session = Arc::new(StreamSession::new(
            id.clone(),
            kind,
            opened.content_type.clone(),
            permit,
        ));

        // The open path proved first content, so the start transition
        // cannot be contested here.
        let started = session.settle().advance(SessionPhase::Started);
        debug_assert!(started);

        session.add_bytes(opened.bytes_so_far);
        session.add_frames(opened.frames_so_far);

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::clone(&session));
        self.total_created.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            session = %id,
            kind = %kind,
            content_type = opened.content_type.as_deref().unwrap_or("-"),
            "Session started"
        );
        let _ = self.events.send(SessionEvent::Started {
            id: id.clone(),
            kind,
        });

        // Requester first, then its first payloads: it must not miss them.
        self.install_sink(&session, sink).await;
        for payload in opened.initial {
            session.deliver(payload).await;
        }

        let registry = Arc::clone(self);
        let pump_session = Arc::clone(&session);
        let handle = tokio::spawn(async move {
            run_pump(registry, pump_session, opened.body, opened.demux).await;
        });
        session.set_pump(handle);

        Ok(id)
    }

    /// Attach a sink and watch for its close event
    async fn install_sink(self: &Arc<Self>, session: &Arc<StreamSession>, sink: Arc<dyn ClientSink>) {
        let sink_id = session.attach(Arc::clone(&sink)).await;

        let registry = Arc::downgrade(self);
        let id = session.id().clone();
        let watcher = tokio::spawn(async move {
            sink.closed().await;
            if let Some(registry) = registry.upgrade() {
                registry.on_sink_closed(&id, sink_id).await;
            }
        });
        session.track_watcher(watcher);
    }

    async fn on_sink_closed(self: &Arc<Self>, id: &StreamId, sink_id: crate::session::SinkId) {
        let session = self.sessions.read().await.get(id).cloned();
        let Some(session) = session else {
            return;
        };

        let remaining = session.detach(sink_id).await;
        if remaining == 0 {
            // No orphaned background transfers: the last client leaving
            // cancels the upstream immediately. The caller here is the
            // closing sink's own watcher task, which teardown aborts, so
            // the teardown must run on its own task or it cancels itself
            // at the first await.
            tracing::debug!(session = %id, "Last client detached; stopping");
            let registry = Arc::clone(self);
            let id = id.clone();
            tokio::spawn(async move {
                registry.finish_session(&id, true).await;
            });
        }
    }

    /// Common teardown for external stop, last-detach and pump completion
    ///
    /// `abort_pump` is false only when the pump itself is the caller and is
    /// about to return anyway.
    async fn finish_session(&self, id: &StreamId, abort_pump: bool) -> bool {
        let session = { self.sessions.write().await.remove(id) };
        let Some(session) = session else {
            return false;
        };

        // A session in the map is Started; a lost transition here means a
        // concurrent teardown won and already owns cleanup.
        if !session.settle().advance(SessionPhase::Stopped) {
            return true;
        }

        if abort_pump {
            if let Some(pump) = session.take_pump() {
                // Aborting the pump drops the upstream body stream, which
                // closes the device socket.
                pump.abort();
            }
        } else {
            session.take_pump();
        }

        session.finish_sinks().await;
        session.release_permit();

        let stats = session.final_stats();
        tracing::info!(
            session = %id,
            duration_ms = stats.duration.as_millis() as u64,
            bytes = stats.bytes,
            frames = stats.frames,
            "Session stopped"
        );
        let _ = self.events.send(SessionEvent::Stopped {
            id: id.clone(),
            stats,
        });

        true
    }
}

/// Per-session transfer loop
///
/// Reads upstream chunks in arrival order and fans them out: raw
/// passthrough for live, demux-and-wrap for replay. Ends the session on
/// upstream end or error; never retries. Reconnect policy belongs to the
/// caller.
async fn run_pump(
    registry: Arc<StreamRegistry>,
    session: Arc<StreamSession>,
    mut body: ByteStream,
    mut demux: Option<FrameDemuxer>,
) {
    loop {
        match body.next().await {
            Some(Ok(chunk)) => {
                session.add_bytes(chunk.len() as u64);

                match demux.as_mut() {
                    None => {
                        session.deliver(chunk).await;
                    }
                    Some(demux) => {
                        demux.push(&chunk);
                        for frame in demux.extract_frames() {
                            session.add_frames(1);
                            session.deliver(multipart::encode_part(&frame)).await;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(session = %session.id(), error = %e, "Upstream error");
                let _ = registry.events.send(SessionEvent::Error {
                    id: session.id().clone(),
                    message: e.to_string(),
                });
                registry.finish_session(session.id(), false).await;
                return;
            }
            None => {
                tracing::debug!(session = %session.id(), "Upstream ended");
                registry.finish_session(session.id(), false).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::device::testing::{BodyEvent, FakeTransport, Script};
    use crate::session::sink::testing::CollectingSink;
    use bytes::Bytes;
    use tokio::time::Instant;

    fn jpeg(payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0xFF, 0xD8];
        f.extend_from_slice(payload);
        f.extend_from_slice(&[0xFF, 0xD9]);
        f
    }

    fn endpoint() -> DeviceEndpoint {
        DeviceEndpoint::new("http://192.168.8.20")
    }

    fn registry_with(
        scripts: Vec<Script>,
        config: GatewayConfig,
    ) -> (Arc<StreamRegistry>, Arc<FakeTransport>) {
        let transport = FakeTransport::new(scripts);
        let registry = StreamRegistry::new(config, transport.clone());
        (registry, transport)
    }

    /// A live script that sends three chunks then keeps the connection open
    fn three_chunk_live() -> Script {
        Script {
            status: 200,
            content_type: Some("video/x-motion-jpeg".to_string()),
            events: vec![
                BodyEvent::Chunk(Bytes::from_static(b"chunk-1")),
                BodyEvent::Delay(Duration::from_millis(100)),
                BodyEvent::Chunk(Bytes::from_static(b"chunk-2")),
                BodyEvent::Delay(Duration::from_millis(100)),
                BodyEvent::Chunk(Bytes::from_static(b"chunk-3")),
                BodyEvent::Hang,
            ],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_gate_rejects_before_io() {
        let (registry, transport) = registry_with(
            vec![three_chunk_live()],
            GatewayConfig::default().max_sessions(0),
        );

        let err = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::CapacityExceeded { .. }));
        // The gate fires before any network call
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_released_on_stop() {
        let (registry, _) = registry_with(
            vec![three_chunk_live(), three_chunk_live()],
            GatewayConfig::default().max_sessions(1),
        );

        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap();

        // Full
        let err = registry
            .create_live(&endpoint(), 2, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::CapacityExceeded { .. }));

        assert!(registry.stop(&id).await);

        // Slot free again
        registry
            .create_live(&endpoint(), 2, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_fan_out_identical_ordered() {
        let (registry, _) = registry_with(vec![three_chunk_live()], GatewayConfig::default());

        let a = CollectingSink::new();
        let b = CollectingSink::new();

        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), a.clone())
            .await
            .unwrap();
        assert!(registry.attach_client(&id, b.clone()).await);

        tokio::time::sleep(Duration::from_millis(300)).await;

        // A sees everything in order; B attached after the first chunk was
        // already delivered and gets only the later two, byte-identical.
        assert_eq!(a.received(), b"chunk-1chunk-2chunk-3");
        assert_eq!(b.received(), b"chunk-2chunk-3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_attach_gets_no_history() {
        let (registry, _) = registry_with(vec![three_chunk_live()], GatewayConfig::default());

        let a = CollectingSink::new();
        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), a.clone())
            .await
            .unwrap();

        // Attach after two more chunks have flowed
        tokio::time::sleep(Duration::from_millis(150)).await;
        let late = CollectingSink::new();
        assert!(registry.attach_client(&id, late.clone()).await);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(a.received(), b"chunk-1chunk-2chunk-3");
        assert_eq!(late.received(), b"chunk-3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_wraps_frames_as_multipart() {
        let frame_a = jpeg(b"frame-a");
        let frame_b = jpeg(b"frame-bb");

        // The two frames arrive split at an awkward boundary
        let mut stream = frame_a.clone();
        stream.extend_from_slice(&frame_b);
        let (left, right) = stream.split_at(frame_a.len() + 3);

        let script = Script {
            status: 200,
            content_type: None,
            events: vec![
                BodyEvent::Chunk(Bytes::copy_from_slice(left)),
                BodyEvent::Delay(Duration::from_millis(50)),
                BodyEvent::Chunk(Bytes::copy_from_slice(right)),
                BodyEvent::Hang,
            ],
        };
        let (registry, _) = registry_with(vec![script], GatewayConfig::default());

        let sink = CollectingSink::new();
        let id = registry
            .create_replay(&endpoint(), 3, 1_700_000_000, ReplayOptions::default(), sink.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let parts = sink.chunks();
        assert_eq!(parts.len(), 2);
        let first = String::from_utf8_lossy(&parts[0]).into_owned();
        let second = String::from_utf8_lossy(&parts[1]).into_owned();
        assert!(first.contains(&format!("Content-Length: {}\r\n", frame_a.len())));
        assert!(second.contains(&format!("Content-Length: {}\r\n", frame_b.len())));

        let snap = registry.list_active().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].frames, 2);
        assert_eq!(
            snap[0].content_type.as_deref(),
            Some(multipart::REPLAY_CONTENT_TYPE)
        );

        registry.stop(&id).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_watchdog_no_recording() {
        let (registry, _) = registry_with(vec![Script::silent()], GatewayConfig::default());

        let started = Instant::now();
        let err = registry
            .create_replay(
                &endpoint(),
                3,
                1_700_000_000,
                ReplayOptions::default(),
                CollectingSink::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::NoData(_)));
        assert!(started.elapsed() >= Duration::from_secs(20));

        let stats = registry.stats().await;
        assert_eq!(stats.active, 0);
        assert_eq!(stats.total_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_detach_stops_session() {
        let (registry, _) = registry_with(vec![three_chunk_live()], GatewayConfig::default());

        let sink = CollectingSink::new();
        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), sink.clone())
            .await
            .unwrap();
        let mut events = registry.events();

        // Simulate the only client disconnecting
        sink.close();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(registry.list_active().await.is_empty());
        assert!(!registry.stop(&id).await); // already gone

        // The stop notification carries final stats
        loop {
            match events.recv().await.unwrap() {
                SessionEvent::Stopped { id: stopped, stats } => {
                    assert_eq!(stopped, id);
                    assert_eq!(stats.bytes, 7); // chunk-1 only
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_detach_teardown_survives_suspension() {
        // The graceful finish of each sink awaits; the teardown triggered
        // by the last close must complete across those suspension points,
        // release the capacity slot and emit the stop notification.
        let (registry, _) = registry_with(
            vec![three_chunk_live(), three_chunk_live()],
            GatewayConfig::default().max_sessions(1),
        );
        let mut events = registry.events();

        let sink = CollectingSink::new();
        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), sink.clone())
            .await
            .unwrap();

        sink.close();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(sink.finished());
        assert!(registry.list_active().await.is_empty());

        // The permit came back: a second session fits the single slot
        registry
            .create_live(&endpoint(), 2, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap();

        let mut saw_stop = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Stopped { id: stopped, .. } = event {
                if stopped == id {
                    saw_stop = true;
                }
            }
        }
        assert!(saw_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_stop_unknown_is_not_found() {
        let (registry, _) = registry_with(vec![three_chunk_live()], GatewayConfig::default());

        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap();
        registry.try_stop(&id).await.unwrap();

        let err = registry.try_stop(&id).await.unwrap_err();
        assert!(matches!(err, GatewayError::StreamNotFound(_)));
        assert!(err.is_pre_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_unknown_safe() {
        let (registry, _) = registry_with(vec![three_chunk_live()], GatewayConfig::default());

        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap();

        assert!(registry.stop(&id).await);
        assert!(!registry.stop(&id).await);
        assert!(!registry.stop(&StreamId::test("live:x:cam9:-:0:99")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_to_unknown_session() {
        let (registry, _) = registry_with(vec![], GatewayConfig::default());

        let attached = registry
            .attach_client(&StreamId::test("live:x:cam9:-:0:99"), CollectingSink::new())
            .await;
        assert!(!attached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_end_emits_error_free_stop() {
        // Device closes cleanly after its chunks; session stops without an
        // error event.
        let script = Script {
            status: 200,
            content_type: None,
            events: vec![BodyEvent::Chunk(Bytes::from_static(b"only"))],
        };
        let (registry, _) = registry_with(vec![script], GatewayConfig::default());
        let mut events = registry.events();

        registry
            .create_live(&endpoint(), 1, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(registry.list_active().await.is_empty());

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::Error { .. }) {
                saw_error = true;
            }
        }
        assert!(!saw_error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_error_notifies_then_stops() {
        let script = Script {
            status: 200,
            content_type: None,
            events: vec![
                BodyEvent::Chunk(Bytes::from_static(b"data")),
                BodyEvent::Delay(Duration::from_millis(10)),
                BodyEvent::Error("connection reset by peer".to_string()),
            ],
        };
        let (registry, _) = registry_with(vec![script], GatewayConfig::default());
        let mut events = registry.events();

        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), CollectingSink::new())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(registry.list_active().await.is_empty());

        // Started, then Error, then Stopped
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::Started { .. }
        ));
        match events.try_recv().unwrap() {
            SessionEvent::Error { id: errored, message } => {
                assert_eq!(errored, id);
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected Error event, got {other:?}"),
        }
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::Stopped { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_all() {
        let (registry, _) = registry_with(
            vec![three_chunk_live(), three_chunk_live(), three_chunk_live()],
            GatewayConfig::default(),
        );

        for camera in 1..=3 {
            registry
                .create_live(&endpoint(), camera, LiveOptions::default(), CollectingSink::new())
                .await
                .unwrap();
        }
        assert_eq!(registry.stats().await.active, 3);

        registry.shutdown_all().await;

        let stats = registry.stats().await;
        assert_eq!(stats.active, 0);
        assert_eq!(stats.total_created, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_sink_isolated_from_siblings() {
        let (registry, _) = registry_with(vec![three_chunk_live()], GatewayConfig::default());

        let healthy = CollectingSink::new();
        let broken = CollectingSink::new();

        let id = registry
            .create_live(&endpoint(), 1, LiveOptions::default(), healthy.clone())
            .await
            .unwrap();
        assert!(registry.attach_client(&id, broken.clone()).await);
        broken.fail_writes();

        tokio::time::sleep(Duration::from_millis(300)).await;

        // The healthy sink saw everything despite its sibling failing
        assert_eq!(healthy.received(), b"chunk-1chunk-2chunk-3");
        // The broken sink is still attached; write failures never detach
        let snap = registry.list_active().await;
        assert_eq!(snap[0].clients, 2);
    }
}
