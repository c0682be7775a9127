//! Log node server.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                       LOG NODE                       │
//!                 │                                                      │
//!   flags + TOML ─┼─▶ config ─▶ storage / quota / directory collaborators │
//!                 │                        │                             │
//!                 │                        ▼                             │
//!                 │   ┌──────────────── lifecycle::Node ─────────────┐   │
//!                 │   │ health gate → bind → announce → register     │   │
//!                 │   │       → serve (rpc, http) → tree GC          │   │
//!                 │   └──────────────────────────────────────────────┘   │
//!   RPC clients ──┼─▶ rpc listener (TLS optional) ─▶ tree admin service  │
//!   scrapers ─────┼─▶ http listener ─▶ /healthz /metrics /debug/vars     │
//!                 │                                                      │
//!   SIGTERM ──────┼─▶ drain: stop GC → deregister → close → storage      │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use log_node::admin::TreeAdminService;
use log_node::config::args::NodeArgs;
use log_node::directory::{Directory, EtcdDirectory, NoopDirectory};
use log_node::keys::NoKeyGeneration;
use log_node::lifecycle::signals::spawn_signal_handler;
use log_node::observability::logging::init_logging;
use log_node::observability::metrics::init_metrics;
use log_node::observability::MetricFactory;
use log_node::{quota, storage, Node, NodeConfig, NodeDeps, Shutdown};

#[tokio::main]
async fn main() -> ExitCode {
    let args = NodeArgs::parse();
    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Log node starting");

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Log node exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: NodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let handle = init_metrics()?;
    let metrics = MetricFactory::new(&config.observability.stats_prefix, handle);

    let storage = storage::open_provider(&config.storage.provider)?;
    let quota_manager = quota::new_manager(&config.quota.system)?;

    let directory: Arc<dyn Directory> = if config.directory.enabled() {
        Arc::new(EtcdDirectory::connect(&config.directory.servers, config.directory.lease_ttl_secs).await?)
    } else {
        tracing::info!("No directory servers configured, skipping announcements");
        Arc::new(NoopDirectory)
    };

    let deps = NodeDeps {
        storage,
        directory,
        quota_manager,
        key_factory: Arc::new(NoKeyGeneration),
        metrics,
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    Node::new(config, deps, TreeAdminService)
        .run(shutdown.subscribe())
        .await?;
    Ok(())
}
