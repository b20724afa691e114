//! Run a discovery node, printing its peers periodically.
//!
//! Run: `cargo run --example node -- --port 5050 --bootstrap 127.0.0.1:5051`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{thread, time::Duration};

use clap::Parser;
use peer_explorer::Discovery;
use tracing::{info, Level};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// UDP port to listen on
    #[arg(short, long)]
    port: Option<u16>,
    /// Boot nodes, as `host:port`
    #[arg(short, long)]
    bootstrap: Vec<String>,
    /// Network id, messages from other networks are ignored
    #[arg(short, long, default_value_t = 0)]
    network_id: u32,
    /// Log every message sent and received
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::TRACE } else { Level::INFO })
        .with_thread_names(true)
        .init();

    let mut builder = Discovery::builder();
    builder.bootstrap(&cli.bootstrap).network_id(cli.network_id);

    if let Some(port) = cli.port {
        builder.port(port);
    }

    let mut discovery = builder.build().expect("Failed to start discovery node");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let info = discovery.info().expect("Discovery node was shutdown");
    info!(id = %info.id(), address = ?info.local_addr(), "Discovery node is running! Press Ctrl+C to stop.");

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_secs(1));

        if let Ok(info) = discovery.info() {
            info!(
                peers = info.established_connections(),
                table = info.distance_table_size(),
                pending_pings = info.pending_pings(),
                challenges = info.challenges(),
                "Status"
            );
        }
    }

    info!("Shutting down...");
    discovery.shutdown();
}
