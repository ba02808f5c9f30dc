//! Replay session open
//!
//! Requests device-side variable-speed playback and waits for the first
//! complete frame. The device reply is a continuous stream of concatenated
//! JPEG frames with no outer framing, so bytes accumulate in the demuxer
//! until a frame parses.
//!
//! A watchdog runs from request time. If it fires before the first complete
//! frame is demuxed there is almost certainly no recording at the requested
//! timestamp (the device streams nothing over coverage gaps), so the open
//! fails with a distinct "no recording" error and the connection is aborted.
//! The watchdog is cleared the instant the first frame parses; after that,
//! delivery pacing is entirely the gateway's concern.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{timeout_at, Instant};

use super::OpenedUpstream;
use crate::device::client::{collect_error_body, DEFAULT_SILENCE_WINDOW};
use crate::device::DeviceTransport;
use crate::error::{GatewayError, Result};
use crate::mjpeg::{multipart, FrameDemuxer};

/// Open a replay upstream and wait for the first demuxed frame
pub(crate) async fn open_replay(
    transport: &Arc<dyn DeviceTransport>,
    url: &str,
    watchdog: Duration,
) -> Result<OpenedUpstream> {
    let deadline = Instant::now() + watchdog;

    // The watchdog covers the request itself too; a device that never
    // answers the replay CGI is indistinguishable from one with no footage.
    let response = match timeout_at(deadline, transport.open(url)).await {
        Ok(result) => result?,
        Err(_) => return Err(GatewayError::NoData(watchdog)),
    };

    if response.status != 200 {
        let body = collect_error_body(response.body, DEFAULT_SILENCE_WINDOW, deadline).await;
        return Err(GatewayError::DeviceError {
            status: response.status,
            body,
        });
    }

    let mut body = response.body;
    let mut demux = FrameDemuxer::new();
    let mut bytes_so_far: u64 = 0;

    loop {
        match timeout_at(deadline, body.next()).await {
            Ok(Some(Ok(chunk))) => {
                bytes_so_far += chunk.len() as u64;
                demux.push(&chunk);

                let frames = demux.extract_frames();
                if frames.is_empty() {
                    continue;
                }

                tracing::debug!(
                    url = url,
                    frames = frames.len(),
                    bytes = bytes_so_far,
                    "Replay stream started"
                );

                let frames_so_far = frames.len() as u64;
                let initial = frames.iter().map(multipart::encode_part).collect();

                return Ok(OpenedUpstream {
                    content_type: Some(multipart::REPLAY_CONTENT_TYPE.to_string()),
                    initial,
                    body,
                    demux: Some(demux),
                    bytes_so_far,
                    frames_so_far,
                });
            }
            Ok(Some(Err(e))) => return Err(GatewayError::DeviceUnreachable(e.to_string())),
            // Stream ended before a single frame parsed: no recording at
            // this timestamp.
            Ok(None) => return Err(GatewayError::NoData(watchdog)),
            // Watchdog fired; dropping the body aborts the connection.
            Err(_) => return Err(GatewayError::NoData(watchdog)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::{BodyEvent, FakeTransport, Script};
    use bytes::Bytes;

    fn jpeg(payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0xFF, 0xD8];
        f.extend_from_slice(payload);
        f.extend_from_slice(&[0xFF, 0xD9]);
        f
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_completes_on_first_frame() {
        let frame = jpeg(b"frame-one");
        // Frame delivered split across two chunks; only the second makes
        // it complete.
        let (a, b) = frame.split_at(5);
        let transport: Arc<dyn DeviceTransport> = FakeTransport::new(vec![Script {
            status: 200,
            content_type: None,
            events: vec![
                BodyEvent::Chunk(Bytes::copy_from_slice(a)),
                BodyEvent::Delay(Duration::from_millis(40)),
                BodyEvent::Chunk(Bytes::copy_from_slice(b)),
                BodyEvent::Hang,
            ],
        }]);

        let opened = open_replay(&transport, "http://dev/replay_pic.cgi", Duration::from_secs(20))
            .await
            .unwrap();

        assert_eq!(
            opened.content_type.as_deref(),
            Some(multipart::REPLAY_CONTENT_TYPE)
        );
        assert_eq!(opened.frames_so_far, 1);
        assert_eq!(opened.bytes_so_far, frame.len() as u64);

        // The initial payload is the frame already wrapped as a part
        let part = String::from_utf8_lossy(&opened.initial[0]).into_owned();
        assert!(part.starts_with("--frame\r\n"));
        assert!(part.contains(&format!("Content-Length: {}\r\n", frame.len())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_fires_on_silent_device() {
        let transport: Arc<dyn DeviceTransport> = FakeTransport::new(vec![Script::silent()]);

        let started = Instant::now();
        let err = open_replay(&transport, "http://dev/replay_pic.cgi", Duration::from_secs(20))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, GatewayError::NoData(_)));
        // Fires at the watchdog, not earlier or later
        assert!(elapsed >= Duration::from_secs(20));
        assert!(elapsed < Duration::from_millis(20_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_without_frames_is_no_recording() {
        // Device sends a few bytes that never form a frame, then closes.
        let transport: Arc<dyn DeviceTransport> = FakeTransport::new(vec![Script::ok(vec![
            Bytes::from_static(&[0x00, 0x01, 0x02]),
        ])]);

        let err = open_replay(&transport, "http://dev/replay_pic.cgi", Duration::from_secs(20))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::NoData(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_error_surfaces_status_and_body() {
        let transport: Arc<dyn DeviceTransport> =
            FakeTransport::new(vec![Script::error(500, "disk failure")]);

        let err = open_replay(&transport, "http://dev/replay_pic.cgi", Duration::from_secs(20))
            .await
            .unwrap_err();

        match err {
            GatewayError::DeviceError { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "disk failure");
            }
            other => panic!("expected DeviceError, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_leftover_tail_stays_in_demuxer() {
        // First chunk carries one full frame plus the start of the next.
        let first = jpeg(b"one");
        let mut chunk = first.clone();
        chunk.extend_from_slice(&[0xFF, 0xD8, 0x42]);

        let transport: Arc<dyn DeviceTransport> = FakeTransport::new(vec![Script {
            status: 200,
            content_type: None,
            events: vec![BodyEvent::Chunk(Bytes::from(chunk)), BodyEvent::Hang],
        }]);

        let opened = open_replay(&transport, "http://dev/replay_pic.cgi", Duration::from_secs(20))
            .await
            .unwrap();

        assert_eq!(opened.frames_so_far, 1);
        // The partial second frame is retained for the pump to finish
        assert_eq!(opened.demux.as_ref().unwrap().buffered(), 3);
    }
}
