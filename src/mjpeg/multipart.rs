//! Multipart framing for replay output
//!
//! Browsers expect `multipart/x-mixed-replace` for motion JPEG, so the
//! gateway imposes that framing on the device's unframed frame stream:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: N\r\n
//! \r\n
//! <frame bytes>\r\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Part boundary token
pub const BOUNDARY: &str = "frame";

/// Content type advertised for replay streams
pub const REPLAY_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wrap one JPEG frame as a multipart part
pub fn encode_part(frame: &Bytes) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );

    let mut part = BytesMut::with_capacity(header.len() + frame.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(frame);
    part.put_slice(b"\r\n");
    part.freeze()
}
