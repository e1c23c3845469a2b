//! Peer node runner.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────┐
//!   │ RootNode "node"                              │
//!   │   └── OverlayManager "overlay"               │
//!   │         ├── PeerSession "peer-<uuid>"        │
//!   │         ├── PeerSession "peer-<uuid>"        │
//!   │         └── ...                              │
//!   └──────────────────────────────────────────────┘
//!
//!   start:  node → overlay → sessions (arm timers)
//!   Ctrl-C or --run-for elapsed
//!   stop:   on_stop node → overlay → sessions (cancel timers)
//!           wait sessions → overlay → node
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::runtime::Handle;

use node_lifecycle::config::{load_config, NodeConfig};
use node_lifecycle::lifecycle::{NodeId, Passive, RootNode};
use node_lifecycle::observability::{logging, metrics};
use node_lifecycle::services::OverlayManager;

#[derive(Parser)]
#[command(name = "node-lifecycle")]
#[command(about = "Run a peer node under the lifecycle coordinator", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of peer sessions to open (overrides config).
    #[arg(short, long)]
    peers: Option<usize>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    run_for: Option<u64>,

    /// Print the final tree state as JSON.
    #[arg(long)]
    dump_tree: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => NodeConfig::default(),
    };
    if let Some(peers) = cli.peers {
        config.overlay.peers = peers;
    }

    logging::init_logging(&config.observability);
    tracing::info!("node-lifecycle v0.1.0 starting");

    tracing::info!(
        peers = config.overlay.peers,
        stop_grace_ms = config.lifecycle.stop_grace_ms,
        exchange_interval_ms = config.overlay.exchange_interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Assemble the tree before any phase runs.
    let root = Arc::new(RootNode::with_timings(
        "node",
        Arc::new(Passive),
        config.lifecycle.timings(),
    ));
    let overlay = Arc::new(OverlayManager::new(config.overlay.clone(), Handle::current()));
    let overlay_node = root.attach(NodeId::ROOT, "overlay", overlay.clone())?;
    for _ in 0..config.overlay.peers {
        overlay.add_session(&root, overlay_node.id())?;
    }

    // The walks block, so keep them off the runtime workers.
    let starter = Arc::clone(&root);
    tokio::task::spawn_blocking(move || starter.start()).await?;
    tracing::info!(nodes = root.len(), "Node running");

    wait_for_shutdown(cli.run_for).await;

    let stopper = Arc::clone(&root);
    tokio::task::spawn_blocking(move || stopper.stop()).await??;

    if cli.dump_tree {
        println!("{}", serde_json::to_string_pretty(&root.snapshot())?);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown(run_for: Option<u64>) {
    let deadline = async {
        match run_for {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => tracing::info!("Interrupt received, stopping"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C, stopping"),
        },
        _ = deadline => tracing::info!("Run time elapsed, stopping"),
    }
}
