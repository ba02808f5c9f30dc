//! Gateway error taxonomy
//!
//! Errors that surface synchronously to callers of the registry and device
//! client. Per-sink write failures are deliberately *not* represented here:
//! they are isolated at the write site (see [`crate::session::sink`]) and must
//! never tear down a session or abort fan-out to sibling sinks.

use std::time::Duration;

use crate::registry::StreamId;

/// Errors produced by gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Registry is at its configured session limit. Rejected before any
    /// device I/O is attempted.
    #[error("session limit reached ({active}/{max} active)")]
    CapacityExceeded { active: usize, max: usize },

    /// Transport-level failure reaching the device (connect, DNS, TLS).
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    /// Device answered with a non-200 status. The error body is collected in
    /// full before this is raised, since devices put diagnostics there.
    #[error("device returned status {status}: {body}")]
    DeviceError { status: u16, body: String },

    /// No activity from the device within the hard time window.
    #[error("no device activity within {0:?}")]
    DeviceTimeout(Duration),

    /// Replay watchdog expired before the first complete frame was demuxed.
    /// Usually means there is no recording at the requested timestamp
    /// (a coverage gap), so the device streams nothing.
    #[error("no recording data within {0:?}; possible coverage gap at the requested timestamp")]
    NoData(Duration),

    /// Operation referenced a session id that is not active.
    #[error("stream not found: {0}")]
    StreamNotFound(StreamId),
}

/// Convenience result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Whether the failure happened before any device connection was made
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            GatewayError::CapacityExceeded { .. } | GatewayError::StreamNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GatewayError::CapacityExceeded { active: 100, max: 100 };
        assert_eq!(err.to_string(), "session limit reached (100/100 active)");

        let err = GatewayError::DeviceError {
            status: 503,
            body: "camera offline".to_string(),
        };
        assert_eq!(err.to_string(), "device returned status 503: camera offline");

        let err = GatewayError::NoData(Duration::from_secs(20));
        assert!(err.to_string().contains("coverage gap"));
    }

    #[test]
    fn test_pre_flight_classification() {
        assert!(GatewayError::CapacityExceeded { active: 1, max: 1 }.is_pre_flight());
        assert!(!GatewayError::DeviceTimeout(Duration::from_secs(10)).is_pre_flight());
        assert!(!GatewayError::DeviceUnreachable("refused".into()).is_pre_flight());
    }
}
