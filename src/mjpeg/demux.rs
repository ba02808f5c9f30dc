//! JPEG frame boundary recovery
//!
//! Frames are delimited by the two-byte JPEG start-of-image marker (`FF D8`)
//! and, scanning forward from it, the end-of-image marker (`FF D9`); a frame
//! spans start to end inclusive. The demuxer is fed transport chunks as they
//! arrive and makes no assumption that frame boundaries align with chunk
//! boundaries; a marker pair split across two deliveries is handled.

use bytes::{Bytes, BytesMut};

/// JPEG start-of-image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Restartable JPEG frame demuxer over an accumulation buffer
///
/// Invoked repeatedly as bytes accumulate; resumes from the previous tail
/// and never re-emits an already extracted frame.
#[derive(Debug, Default)]
pub struct FrameDemuxer {
    buf: BytesMut,
    /// Next offset to resume the end-marker scan from, valid while the
    /// buffer starts with a start marker whose end has not been seen yet.
    /// Avoids rescanning the whole partial frame on every chunk.
    eoi_from: usize,
    /// Total frames extracted over the demuxer's lifetime
    frames_extracted: u64,
}

impl FrameDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transport chunk to the accumulation buffer
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract every complete frame currently in the buffer
    ///
    /// Consumed bytes are dropped from the buffer. With no start marker the
    /// buffer is retained as-is; with a start marker but no end marker yet,
    /// the buffer is retained from the start marker onward and any leading
    /// garbage before it is discarded.
    pub fn extract_frames(&mut self) -> Vec<Bytes> {
        let mut frames = Vec::new();

        loop {
            let Some(soi) = find_pair(&self.buf, 0, SOI[1]) else {
                self.eoi_from = 2;
                break;
            };

            if soi > 0 {
                // Leading garbage before the start marker. Seen on replay
                // streams that begin mid-frame.
                let _ = self.buf.split_to(soi);
                self.eoi_from = 2;
            }

            let from = self.eoi_from.max(2);
            match find_pair(&self.buf, from, EOI[1]) {
                Some(eoi) => {
                    let frame = self.buf.split_to(eoi + 2).freeze();
                    self.frames_extracted += 1;
                    self.eoi_from = 2;
                    frames.push(frame);
                }
                None => {
                    // Partial frame. Resume one byte back next time in case
                    // the marker pair is split across chunks.
                    self.eoi_from = self.buf.len().saturating_sub(1).max(2);
                    break;
                }
            }
        }

        frames
    }

    /// Bytes currently held in the accumulation buffer
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Total frames extracted so far
    pub fn frames_extracted(&self) -> u64 {
        self.frames_extracted
    }

    /// Drop the accumulation buffer
    pub fn clear(&mut self) {
        self.buf.clear();
        self.eoi_from = 2;
    }
}

/// Find the byte pair `FF <second>` at or after `from`
fn find_pair(buf: &[u8], from: usize, second: u8) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    (from..buf.len() - 1).find(|&i| buf[i] == 0xFF && buf[i + 1] == second)
}
