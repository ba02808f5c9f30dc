//! Statistics for sessions and the registry

use std::time::Duration;

use crate::registry::StreamId;
use crate::session::SessionKind;

/// Point-in-time view of one active session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Session id
    pub id: StreamId,
    /// Live or replay
    pub kind: SessionKind,
    /// Content type the routing layer should expose downstream
    pub content_type: Option<String>,
    /// Currently attached clients
    pub clients: usize,
    /// Upstream bytes processed
    pub bytes: u64,
    /// Frames delivered (replay only; zero for live passthrough)
    pub frames: u64,
    /// Time since the session was created
    pub uptime: Duration,
}

/// Final accounting carried in the stop notification
#[derive(Debug, Clone)]
pub struct FinalStats {
    /// Session lifetime
    pub duration: Duration,
    /// Upstream bytes processed
    pub bytes: u64,
    /// Frames delivered (replay only)
    pub frames: u64,
}

/// Registry-wide counters
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Active sessions right now
    pub active: usize,
    /// Configured maximum
    pub max_sessions: usize,
    /// Sessions ever started
    pub total_created: u64,
    /// Open attempts that failed
    pub total_failed: u64,
}
