//! Gateway configuration

use std::time::Duration;

/// Gateway configuration options
///
/// The timing defaults encode hard-won knowledge about the target devices:
/// they keep connections open after a response is logically complete, so the
/// gateway relies on silence windows and watchdogs instead of connection
/// close semantics.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Maximum concurrent streaming sessions
    pub max_sessions: usize,

    /// Silence window for single-shot device fetches: once at least one byte
    /// has arrived, this much quiet declares the response complete
    pub fetch_silence_window: Duration,

    /// Hard ceiling for a single-shot device fetch, regardless of activity
    pub fetch_max_window: Duration,

    /// How long a live open waits for the first body chunk after the
    /// device accepts the request
    pub live_start_timeout: Duration,

    /// Replay watchdog: time allowed between issuing the replay request and
    /// demuxing the first complete frame
    pub replay_watchdog: Duration,

    /// Skip TLS certificate validation for device endpoints. Needed for the
    /// self-signed certificates shipped on internal NVR units.
    pub accept_invalid_certs: bool,

    /// Capacity of the registry lifecycle event channel
    pub event_capacity: usize,

    /// Per-client channel capacity for `ChannelSink`
    pub sink_channel_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            fetch_silence_window: Duration::from_millis(500),
            fetch_max_window: Duration::from_secs(10),
            live_start_timeout: Duration::from_secs(10),
            replay_watchdog: Duration::from_secs(20),
            accept_invalid_certs: false,
            event_capacity: 64,
            sink_channel_capacity: 64,
        }
    }
}

impl GatewayConfig {
    /// Set maximum concurrent sessions
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the fetch silence window
    pub fn fetch_silence_window(mut self, window: Duration) -> Self {
        self.fetch_silence_window = window;
        self
    }

    /// Set the fetch hard ceiling
    pub fn fetch_max_window(mut self, window: Duration) -> Self {
        self.fetch_max_window = window;
        self
    }

    /// Set the live first-byte timeout
    pub fn live_start_timeout(mut self, timeout: Duration) -> Self {
        self.live_start_timeout = timeout;
        self
    }

    /// Set the replay watchdog window
    pub fn replay_watchdog(mut self, window: Duration) -> Self {
        self.replay_watchdog = window;
        self
    }

    /// Accept self-signed device certificates
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}
