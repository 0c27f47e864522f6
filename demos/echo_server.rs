//! Echo server with a small client cap.
//!
//! Demonstrates:
//! - Binding a server with `max_clients` and a ping timeout
//! - Rejecting candidates from the admission hook
//! - Echoing application packets back to the sender
//! - Broadcasting joins and leaves to everyone else
//!
//! Usage:
//!   cargo run --example echo_server
//!   cargo run --example echo_server -- --port 9000
//!   cargo run --example echo_server -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use common::Args;
use serde_json::json;
use ws_session::{Admission, Result, Server, ServerConfig};

// ============================================================================
// Constants
// ============================================================================

const MAX_CLIENTS: usize = 4;
const TIMEOUT_DELAY: Duration = Duration::from_secs(5);
const BLOCKED_ADDRESS: &str = "10.0.0.66";

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
    println!("=== Echo Server ===\n");

    // Callbacks need the server for broadcasts; it exists only after listen.
    let handle: Arc<OnceLock<Server>> = Arc::new(OnceLock::new());
    let on_join = Arc::clone(&handle);
    let on_leave = Arc::clone(&handle);
    let on_packet = Arc::clone(&handle);

    let config = ServerConfig::builder()
        .port(args.port)
        .max_clients(MAX_CLIENTS)
        .timeout_delay(TIMEOUT_DELAY)
        .on_server_ready(|| println!("[1] Listening"))
        .on_connection_attempt(|candidate| {
            (candidate.remote_address() == BLOCKED_ADDRESS)
                .then(|| Admission::reject("address-blocked"))
        })
        .on_connection(move |connection| {
            println!("    + {} from {}", connection.id(), connection.remote_address());
            if let Some(server) = on_join.get() {
                server.broadcast(
                    "joined",
                    Some(json!({ "id": connection.id() })),
                    std::slice::from_ref(connection),
                    None,
                );
            }
        })
        .on_connection_closed(move |connection, data| {
            println!("    - {} {data}", connection.id());
            if let Some(server) = on_leave.get() {
                server.broadcast("left", Some(json!({ "id": connection.id() })), &[], None);
            }
        })
        .on_packet(move |connection, packet| {
            if packet.control().is_some() {
                return;
            }
            if let Some(server) = on_packet.get() {
                let outcome = server.broadcast(
                    &packet.kind,
                    packet.data.clone(),
                    &[],
                    Some(std::slice::from_ref(connection)),
                );
                if !outcome.is_complete() {
                    println!("    ! echo to {} failed", connection.id());
                }
            }
        })
        .build()?;

    let server = Server::listen(config).await?;
    let _ = handle.set(server.clone());

    if let Some(url) = server.ws_url() {
        println!("    URL: {url}");
        println!("    Capacity: {MAX_CLIENTS}, timeout: {TIMEOUT_DELAY:?}\n");
    }

    common::wait_for_exit(args.no_wait).await;

    println!("\n[2] Shutting down...");
    server.shutdown();
    println!("    ✓ Done");

    Ok(())
}
