//! Device CGI endpoint URLs
//!
//! The devices expose their media through two CGI endpoints:
//!
//! ```text
//! GET /display_pic.cgi?cam={n}&res={hi|lo}&format={mjpeg|h264|jpeg}&id={ms}
//! GET /replay_pic.cgi?cam={n}&control=PLAY&time={epoch}&format=jpeg
//!                     &fields=0&speed={n}&id={ms}
//! ```
//!
//! `id` is a millisecond cache-buster; some firmware revisions serve a stale
//! cached response when two requests share identical query strings.
//!
//! The replay URL deliberately omits the device's real-time-pacing flag.
//! With pacing on, the device throttles delivery to wall-clock playback
//! speed, which stalls indefinitely on sparse recordings and trips the
//! watchdog before any data arrives. Without it the device pushes buffered
//! frames as fast as they are available; the gateway, not the device,
//! controls the perceived downstream rate.

use std::time::{SystemTime, UNIX_EPOCH};

/// Live stream resolution, as the devices spell it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hi,
    Lo,
}

impl Resolution {
    fn as_str(&self) -> &'static str {
        match self {
            Resolution::Hi => "hi",
            Resolution::Lo => "lo",
        }
    }
}

/// Live stream media format
///
/// NVR units default to MJPEG; multidetector units default to H.264.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    Mjpeg,
    H264,
    Jpeg,
}

impl StreamFormat {
    fn as_str(&self) -> &'static str {
        match self {
            StreamFormat::Mjpeg => "mjpeg",
            StreamFormat::H264 => "h264",
            StreamFormat::Jpeg => "jpeg",
        }
    }
}

/// Replay speed multiplier
///
/// The devices accept exactly seven jog values; negative is reverse.
/// Anything else silently normalizes to 1x, mirroring how the devices
/// themselves treat unknown values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySpeed(i32);

impl ReplaySpeed {
    const ALLOWED: [i32; 7] = [-16, -4, -1, 1, 4, 16, 64];

    /// Normalize a requested multiplier to a device-supported one
    pub fn new(speed: i32) -> Self {
        if Self::ALLOWED.contains(&speed) {
            Self(speed)
        } else {
            Self(1)
        }
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for ReplaySpeed {
    fn default() -> Self {
        Self(1)
    }
}

/// URL builder for one device
#[derive(Debug, Clone)]
pub struct DeviceEndpoint {
    base_url: String,
}

impl DeviceEndpoint {
    /// Create an endpoint from a device base URL such as
    /// `http://192.168.8.20` or `https://nvr-4.internal`
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// The device base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Host portion of the base URL, used in stream ids
    pub fn host(&self) -> &str {
        let rest = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        rest.split('/').next().unwrap_or(rest)
    }

    /// URL for the live image stream of one camera
    pub fn live_url(&self, camera: u32, resolution: Resolution, format: StreamFormat) -> String {
        format!(
            "{}/display_pic.cgi?cam={}&res={}&format={}&id={}",
            self.base_url,
            camera,
            resolution.as_str(),
            format.as_str(),
            cache_buster(),
        )
    }

    /// URL for device-side replay jog starting at `timestamp` (device epoch
    /// seconds) at the given speed
    pub fn replay_url(&self, camera: u32, timestamp: u64, speed: ReplaySpeed) -> String {
        format!(
            "{}/replay_pic.cgi?cam={}&control=PLAY&time={}&format=jpeg&fields=0&speed={}&id={}",
            self.base_url,
            camera,
            timestamp,
            speed.value(),
            cache_buster(),
        )
    }
}

fn cache_buster() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
