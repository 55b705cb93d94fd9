//! Focus-session pairing server.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               PAIRING SERVICE                │
//!     WebSocket client   │  ┌─────────┐   ┌──────────────────────────┐  │
//!     ───────────────────┼─▶│  http   │──▶│  pairing::SessionCoord.  │  │
//!     ◀──────────────────┼──│   ws    │   │   ├─ MatchingEngine      │  │
//!                        │  └─────────┘   │   │   ├─ BucketQueues    │  │
//!                        │       ▲        │   │   └─ TimeoutCanceller│  │
//!                        │       │        │   └─ ConnectionRegistry  │  │
//!                        │       │        └──────────────────────────┘  │
//!                        │  ┌─────────┐  ┌───────────┐  ┌───────────┐   │
//!                        │  │ config  │  │ lifecycle │  │ observa-  │   │
//!                        │  │ +reload │  │ shutdown  │  │ bility    │   │
//!                        │  └─────────┘  └───────────┘  └───────────┘   │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use focus_pairing::config::watcher::ConfigWatcher;
use focus_pairing::config::{load_config, ServiceConfig};
use focus_pairing::observability::{logging, metrics};
use focus_pairing::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "focus-pairing")]
#[command(about = "WebSocket matchmaking for focus sessions", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("focus-pairing v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        timeout_secs = config.matching.timeout_secs,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Held for the life of the process; dropping it stops reloads.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Only OS signals stop the binary; this handle is never triggered.
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
