//! Ping client.
//!
//! Demonstrates:
//! - Connecting a client and reading its handshake
//! - Keepalive pings and round-trip measurement
//! - Sending an application packet
//! - Leaving with a `close-connection` reason
//!
//! Usage:
//!   cargo run --example echo_server
//!   cargo run --example ping_client
//!   cargo run --example ping_client -- --port 9000 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Args;
use serde_json::json;
use ws_session::{Client, ClientConfig, Result};

// ============================================================================
// Constants
// ============================================================================

const PING_INTERVAL: Duration = Duration::from_secs(1);
const RUN_TIME: Duration = Duration::from_secs(5);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Ping Client ===\n");

    let config = ClientConfig::builder()
        .server("127.0.0.1", args.port)
        .ping_interval(PING_INTERVAL)
        .on_open(|| println!("    Socket open"))
        .on_close(|| println!("    Socket closed"))
        .on_error(|kind, detail| println!("    ! {kind}: {}", detail.unwrap_or_default()))
        .on_connection_successful(|handshake| {
            println!("    ✓ Admitted as {:?}", handshake.id);
        })
        .on_packet(|packet| {
            if packet.control().is_none() {
                println!("    < {} {:?}", packet.kind, packet.data);
            }
        })
        .build()?;

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[1] Connecting to {}...", config.ws_url()?);
    let client = Client::connect(config)?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    if !client.is_connected() {
        println!("    Not admitted yet, waiting for callbacks");
    }

    // ========================================================================
    // Exchange
    // ========================================================================

    println!("\n[2] Sending a chat packet...");
    match client.send_packet("chat", Some(json!({ "text": "hello" }))) {
        Ok(()) => println!("    ✓ Sent"),
        Err(e) => println!("    ! {e}"),
    }

    tokio::time::sleep(RUN_TIME).await;

    println!("\n[3] Ping statistics");
    println!("    Samples: {}", client.ping_history().len());
    if let Some(average) = client.average_ping() {
        println!("    Average: {average:?}");
    }

    // ========================================================================
    // Leave
    // ========================================================================

    println!("\n[4] Leaving...");
    if let Err(e) = client.close_connection("demo-finished") {
        println!("    ! {e}");
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("    ✓ Done");

    Ok(())
}
