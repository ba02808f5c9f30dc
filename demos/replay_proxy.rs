//! Replay proxy demo: serve a device recording as browser-friendly MJPEG
//!
//! Run with: cargo run --example replay_proxy -- <device_url> <camera> <epoch_seconds> [speed]
//!
//! Examples:
//!   cargo run --example replay_proxy -- http://192.168.8.20 3 1700000000
//!   cargo run --example replay_proxy -- http://192.168.8.20 3 1700000000 4
//!
//! This demo demonstrates:
//! - Opening a replay session at a recorded timestamp
//! - The JPEG demux pipeline: the device sends concatenated JPEGs with no
//!   framing, the gateway re-emits `multipart/x-mixed-replace` parts
//! - The no-data watchdog: ask for a timestamp with no recording and the
//!   open fails with a coverage-gap error instead of hanging
//!
//! Each multipart part is written to `replay_out.mjpeg` in the current
//! directory; point a browser-compatible player at it or split the parts
//! back into JPEG files to inspect individual frames.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use nvr_gateway::{
    ChannelSink, DeviceEndpoint, GatewayConfig, HttpDeviceTransport, ReplayOptions, StreamRegistry,
};

fn print_usage() {
    eprintln!("Usage: replay_proxy <device_url> <camera> <epoch_seconds> [speed]");
    eprintln!();
    eprintln!("  device_url     Device base URL, e.g. http://192.168.8.20");
    eprintln!("  camera         Camera index");
    eprintln!("  epoch_seconds  Recording start time, device epoch seconds");
    eprintln!("  speed          Jog multiplier: -16, -4, -1, 1, 4, 16 or 64 (default 1)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let (Some(device_url), Some(camera), Some(timestamp)) =
        (args.get(1), args.get(2), args.get(3))
    else {
        print_usage();
        std::process::exit(1);
    };
    let camera: u32 = camera.parse()?;
    let timestamp: u64 = timestamp.parse()?;
    let speed: i32 = match args.get(4) {
        Some(raw) => raw.parse()?,
        None => 1,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nvr_gateway=debug".parse()?),
        )
        .init();

    let config = GatewayConfig::default().accept_invalid_certs(true);
    let sink_capacity = config.sink_channel_capacity;
    let transport = Arc::new(HttpDeviceTransport::new(config.accept_invalid_certs)?);
    let registry = StreamRegistry::new(config, transport);

    let device = DeviceEndpoint::new(device_url.as_str());
    println!(
        "Opening replay: camera {camera} at t={timestamp} speed={speed}x on {}",
        device.base_url()
    );

    let (sink, mut rx) = ChannelSink::new(sink_capacity);
    let id = match registry
        .create_replay(&device, camera, timestamp, ReplayOptions::speed(speed), sink)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Replay open failed: {e}");
            std::process::exit(1);
        }
    };

    let snapshot = registry.list_active().await;
    if let Some(snap) = snapshot.first() {
        println!(
            "Session {id} started, content type {}",
            snap.content_type.as_deref().unwrap_or("-")
        );
    }

    let mut out = tokio::fs::File::create("replay_out.mjpeg").await?;
    let mut parts = 0u64;
    let mut bytes = 0u64;

    loop {
        tokio::select! {
            part = rx.recv() => {
                match part {
                    Some(part) => {
                        bytes += part.len() as u64;
                        parts += 1;
                        out.write_all(&part).await?;
                        if parts % 25 == 0 {
                            println!("{parts} frames, {bytes} bytes");
                        }
                    }
                    // Replay reached the end of the recording
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                registry.stop(&id).await;
                break;
            }
        }
    }

    out.flush().await?;
    println!("Done: {parts} frames, {bytes} bytes written to replay_out.mjpeg");
    Ok(())
}
