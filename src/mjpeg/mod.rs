//! JPEG frame demuxing and multipart framing
//!
//! Replay streams from the devices are concatenated JPEG images with no
//! outer framing at all: no part boundaries, no length prefixes, nothing.
//! [`FrameDemuxer`] recovers discrete frames from that byte soup using the
//! JPEG start-of-image / end-of-image markers, and [`multipart`] wraps each
//! recovered frame as a `multipart/x-mixed-replace` part on the way to
//! browsers.

pub mod demux;
pub mod multipart;

pub use demux::FrameDemuxer;
pub use multipart::{encode_part, BOUNDARY, REPLAY_CONTENT_TYPE};
