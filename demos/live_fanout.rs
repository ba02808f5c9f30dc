//! Live fan-out demo: one device connection, two downstream clients
//!
//! Run with: cargo run --example live_fanout -- <device_url> [camera]
//!
//! Examples:
//!   cargo run --example live_fanout -- http://192.168.8.20        # camera 1
//!   cargo run --example live_fanout -- https://nvr-4.internal 3   # camera 3
//!
//! This demo demonstrates:
//! - Opening a single live session against a device
//! - Attaching a second client to the same session, so the device sees
//!   exactly one connection regardless of viewer count
//! - Watching session lifecycle events on the registry broadcast channel
//!
//! The stream payload is video, so instead of dumping it to the terminal
//! each client just reports how much it has received.

use std::sync::Arc;
use std::time::Duration;

use nvr_gateway::{
    ChannelSink, DeviceEndpoint, GatewayConfig, HttpDeviceTransport, LiveOptions, SessionEvent,
    StreamRegistry,
};

fn print_usage() {
    eprintln!("Usage: live_fanout <device_url> [camera]");
    eprintln!();
    eprintln!("  device_url   Device base URL, e.g. http://192.168.8.20");
    eprintln!("  camera       Camera index (default 1)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let Some(device_url) = args.get(1) else {
        print_usage();
        std::process::exit(1);
    };
    let camera: u32 = match args.get(2) {
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

    // Print lifecycle events as they happen
    let mut events = registry.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Started { id, kind } => println!("[event] started {kind} {id}"),
                SessionEvent::Stopped { id, stats } => println!(
                    "[event] stopped {id} after {:?} ({} bytes)",
                    stats.duration, stats.bytes
                ),
                SessionEvent::Error { id, message } => {
                    println!("[event] error on {id}: {message}")
                }
            }
        }
    });

    let device = DeviceEndpoint::new(device_url.as_str());
    println!("Opening live stream: camera {camera} on {}", device.base_url());

    let (first_sink, mut first_rx) = ChannelSink::new(sink_capacity);
    let id = registry
        .create_live(&device, camera, LiveOptions::default(), first_sink)
        .await?;
    println!("Session {id} started");

    // Second viewer on the same upstream connection
    let (second_sink, mut second_rx) = ChannelSink::new(sink_capacity);
    registry.attach_client(&id, second_sink).await;

    tokio::spawn(async move {
        let mut total = 0u64;
        while let Some(chunk) = first_rx.recv().await {
            total += chunk.len() as u64;
            println!("[client 1] {total} bytes so far");
        }
        println!("[client 1] stream ended");
    });
    tokio::spawn(async move {
        let mut total = 0u64;
        while let Some(chunk) = second_rx.recv().await {
            total += chunk.len() as u64;
        }
        println!("[client 2] stream ended, {total} bytes total");
    });

    // Periodically show the registry view until Ctrl+C
    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                for snap in registry.list_active().await {
                    println!(
                        "[registry] {} clients={} bytes={} uptime={:?}",
                        snap.id, snap.clients, snap.bytes, snap.uptime
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                registry.shutdown_all().await;
                return Ok(());
            }
        }
    }
}
