//! Segment router server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ RouteRequest ──▶ handler tree
//!                    (request id,                      root handler
//!                     trace, timeout)                    │ rule match, shift
//!                                                        ▼
//!                                                   nested handlers
//!                                                        │ allow-list, action
//!     Client Response                                    ▼
//!     ◀────────────── IntoResponse ◀──────────── Response / DispatchError
//!
//!     config file ──▶ watcher ──▶ validate ──▶ new tree ──▶ ArcSwap
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use segment_router::config::{load_config, watcher::ConfigWatcher};
use segment_router::lifecycle::{wait_for_signal, Shutdown};
use segment_router::observability::{logging, metrics};
use segment_router::HttpServer;

#[derive(Parser)]
#[command(name = "segment-router")]
#[command(about = "Hierarchical URL-segment router", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,

    /// Do not reload the configuration when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    logging::init_tracing(&config.observability.log_level);

    tracing::info!("segment-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        root = %config.dispatch.root,
        handlers = config.handlers.len(),
        request_timeout_secs = config.timeouts.request_secs,
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (watcher, updates) = ConfigWatcher::new(&args.config);
    let _watch_guard = if args.no_watch {
        None
    } else {
        Some(watcher.run()?)
    };

    let server = HttpServer::new(config)?;
    let shutdown = Shutdown::new();

    let serve = server.run(listener, updates, &shutdown);
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => result?,
        _ = wait_for_signal() => {
            tracing::info!("Shutdown signal received, draining requests");
            shutdown.trigger();
            serve.await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
