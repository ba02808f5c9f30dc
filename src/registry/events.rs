//! Lifecycle notifications
//!
//! Session started/stopped/error notifications as an explicit subscription
//! interface. Consumers (audit logs, the routing layer's SSE feed, tests)
//! subscribe via [`crate::registry::StreamRegistry::events`]; a slow or
//! absent subscriber never blocks the registry.

use crate::registry::StreamId;
use crate::session::SessionKind;
use crate::stats::FinalStats;

/// A session lifecycle notification
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session observed its first content and entered the registry
    Started { id: StreamId, kind: SessionKind },
    /// A session was torn down; carries final accounting
    Stopped { id: StreamId, stats: FinalStats },
    /// The upstream failed mid-session; always followed by `Stopped`
    Error { id: StreamId, message: String },
}

impl SessionEvent {
    /// The session this event concerns
    pub fn id(&self) -> &StreamId {
        match self {
            SessionEvent::Started { id, .. } => id,
            SessionEvent::Stopped { id, .. } => id,
            SessionEvent::Error { id, .. } => id,
        }
    }
}
