//! Session settle state machine
//!
//! A session open has several completion paths racing each other: first
//! frame or byte, watchdog expiry, device error, transport error, transport
//! end, external stop. Exactly one of {succeed, fail} may win per attempt.
//! Rather than ad hoc flags at each site, every path funnels through a
//! single guarded transition function.

use std::sync::Mutex;

/// Lifecycle phase of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Open in flight, outcome undecided
    Pending,
    /// First byte (live) / first complete frame (replay) observed
    Started,
    /// Stopped after a successful start
    Stopped,
    /// Open failed; terminal, the session never starts afterwards
    Failed,
}

/// Guarded settle state
///
/// Legal transitions: `Pending → Started`, `Pending → Failed`,
/// `Started → Stopped`. Anything else is refused.
#[derive(Debug)]
pub struct Settle {
    phase: Mutex<SessionPhase>,
}

impl Default for Settle {
    fn default() -> Self {
        Self::new()
    }
}

impl Settle {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(SessionPhase::Pending),
        }
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap()
    }

    /// Attempt a transition; returns whether this call won it
    ///
    /// A `false` return means another completion path settled first (or the
    /// requested edge is illegal) and the caller must stand down.
    pub fn advance(&self, to: SessionPhase) -> bool {
        let mut phase = self.phase.lock().unwrap();
        let legal = matches!(
            (*phase, to),
            (SessionPhase::Pending, SessionPhase::Started)
                | (SessionPhase::Pending, SessionPhase::Failed)
                | (SessionPhase::Started, SessionPhase::Stopped)
        );
        if legal {
            *phase = to;
        }
        legal
    }

    pub fn is_started(&self) -> bool {
        self.phase() == SessionPhase::Started
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase(), SessionPhase::Stopped | SessionPhase::Failed)
    }
}
