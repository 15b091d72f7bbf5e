// session/src/bin/demo_peer.rs
// Exercises two `RoomSession`s against a locally running `room-rendezvous`
// server, joined to the same freshly created room under the same password.
// Both peers run in this one process and share an `InMemoryNegotiator`
// (see `room_session::transport`'s production note — there is no real
// WebRTC stack here), but everything else — HTTP announce/poll, the
// signaling relay, the auth handshake, the CRDT exchange — runs exactly as
// it would between two independent machines.
//
// Run a `room-rendezvous` server first (`cargo run --bin room-rendezvous`),
// then this binary against it.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use room_session::{InMemoryNegotiator, InMemorySetDocument, RoomId, RoomSession, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "demo-peer", about = "Two in-process room-sync peers against a live rendezvous server")]
struct Args {
    /// Base URL of a running rendezvous server.
    #[arg(long, default_value = "http://127.0.0.1:8787")]
    rendezvous_url: String,

    /// Shared room password both demo peers authenticate with.
    #[arg(long, default_value = "correct horse battery staple")]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let room_id = RoomId::generate();
    let negotiator: Arc<dyn room_session::TransportNegotiator> = Arc::new(InMemoryNegotiator::new());

    let mut doc_a = InMemorySetDocument::new();
    let change_a = doc_a.insert("alice's first item");
    let mut doc_b = InMemorySetDocument::new();
    let change_b = doc_b.insert("bob's first item");

    let config = SessionConfig::new(args.rendezvous_url.clone());

    let (session_a, mut events_a) = RoomSession::start(
        config.clone(),
        room_id,
        args.password.clone().into_bytes(),
        Box::new(doc_a),
        negotiator.clone(),
    );
    let (session_b, mut events_b) = RoomSession::start(
        config,
        room_id,
        args.password.clone().into_bytes(),
        Box::new(doc_b),
        negotiator,
    );

    tokio::spawn(async move {
        while let Some(event) = events_a.recv().await {
            tracing::info!(peer = "alice", ?event, "session event");
        }
    });
    tokio::spawn(async move {
        while let Some(event) = events_b.recv().await {
            tracing::info!(peer = "bob", ?event, "session event");
        }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    session_a.apply_local_change(change_a)?;
    session_b.apply_local_change(change_b)?;

    tracing::info!(?room_id, "demo peers running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    session_a.stop();
    session_b.stop();

    // Emit a final status snapshot so a terminal user sees whether
    // convergence was reached before the binary exits.
    tracing::info!(status_a = ?session_a.status(), status_b = ?session_b.status(), "demo peers stopped");

    Ok(())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}
