//! Session registry
//!
//! The registry creates and tracks every streaming session, enforces the
//! concurrent-session ceiling, routes client attach/detach, aggregates
//! stats and performs bulk teardown.
//!
//! ```text
//!                      Arc<StreamRegistry>
//!                ┌────────────────────────────┐
//!                │ sessions: HashMap<         │
//!                │   StreamId,                │
//!                │   Arc<StreamSession>,      │
//!                │ >                          │
//!                │ capacity: Semaphore        │
//!                │ events: broadcast::Sender  │
//!                └──────────────┬─────────────┘
//!                               │ owns, exclusively
//!                ┌──────────────┴─────────────┐
//!                ▼                            ▼
//!          [StreamSession] ──pump──►    [StreamSession] ──pump──►
//!            device conn    sinks         device conn     sinks
//! ```
//!
//! The session map is mutated only through registry-level operations, never
//! by session internals, so there is exactly one source of truth for
//! active-session enumeration. Lifecycle notifications go out on a
//! broadcast channel; subscribe via [`StreamRegistry::events`].

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod events;
pub mod store;

pub use events::SessionEvent;
pub use store::{LiveOptions, ReplayOptions, StreamRegistry};

use crate::session::SessionKind;

/// Opaque session identifier
///
/// Unique per kind + device + camera + timestamp + creation instant; a
/// monotonic sequence number disambiguates identical requests created in
/// the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(Arc<str>);

impl StreamId {
    pub(crate) fn new(
        kind: SessionKind,
        host: &str,
        camera: u32,
        timestamp: Option<u64>,
        seq: u64,
    ) -> Self {
        let created_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let stamp = timestamp
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());

        Self(Arc::from(
            format!("{kind}:{host}:cam{camera}:{stamp}:{created_ms}:{seq}").as_str(),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn test(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_format() {
        let id = StreamId::new(SessionKind::Replay, "192.168.8.20", 3, Some(1_700_000_000), 7);

        let s = id.as_str();
        assert!(s.starts_with("replay:192.168.8.20:cam3:1700000000:"));
        assert!(s.ends_with(":7"));
    }

    #[test]
    fn test_live_id_has_no_timestamp() {
        let id = StreamId::new(SessionKind::Live, "nvr-4", 1, None, 1);
        assert!(id.as_str().starts_with("live:nvr-4:cam1:-:"));
    }

    #[test]
    fn test_sequence_disambiguates() {
        let a = StreamId::new(SessionKind::Live, "dev", 1, None, 1);
        let b = StreamId::new(SessionKind::Live, "dev", 1, None, 2);
        assert_ne!(a, b);
    }
}
