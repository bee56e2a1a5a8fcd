//! Forward caching HTTP proxy.
//!
//! ```text
//!     Client Request           ┌───────────────────────────────────────────────┐
//!     ─────────────────────────┼─▶ net::Listener ──▶ proxy::ConnectionHandler  │
//!                              │                        │        │              │
//!                              │          http::parser ◀┘        ▼              │
//!                              │                           cache::CacheStore    │
//!                              │                           hit │     │ miss     │
//!                              │                               │     ▼          │
//!     Client Response          │                               │  origin ───────┼──▶ Origin
//!     ◀────────────────────────┼── http::writer ◀──────────────┴─────┘          │     Server
//!                              └───────────────────────────────────────────────┘
//! ```
//!
//! Usage:
//! ```text
//! caching-proxy --port 8080 --origin http://dummyjson.com
//! caching-proxy --clear-cache
//! ```

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use caching_proxy::cache::{CacheStore, DiskStore, MemoryStore};
use caching_proxy::config::{
    read_config, validate_config, CacheBackend, MethodPolicy, ProxyConfig, Scheduling,
};
use caching_proxy::lifecycle::{shutdown_on_signal, Shutdown};
use caching_proxy::net::Listener;
use caching_proxy::observability::{logging, metrics};
use caching_proxy::origin::{Origin, OriginClient};
use caching_proxy::proxy::ConnectionHandler;

#[derive(Parser)]
#[command(name = "caching-proxy", version)]
#[command(about = "Forward HTTP proxy that caches origin responses on disk", long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Origin base URL, e.g. http://dummyjson.com
    #[arg(short, long)]
    origin: Option<String>,

    /// TOML configuration file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding cache entries
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// sequential or concurrent
    #[arg(long)]
    scheduling: Option<Scheduling>,

    /// Maximum connections handled at once in concurrent mode
    #[arg(long)]
    max_connections: Option<usize>,

    /// safe-only, force-get or preserve
    #[arg(long)]
    method_policy: Option<MethodPolicy>,

    /// Remove every cached response and exit
    #[arg(long, conflicts_with_all = ["port", "origin"])]
    clear_cache: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);

    if cli.clear_cache {
        return match clear_cache(&config, &mut std::io::stdout()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("error: {}", error);
        }
        eprintln!("usage: caching-proxy --port <PORT> --origin <URL>");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Proxy terminated");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Merge the optional config file with command-line overrides.
fn build_config(cli: &Cli) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(origin) = &cli.origin {
        config.origin.base_url = origin.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = dir.clone();
    }
    if let Some(scheduling) = cli.scheduling {
        config.listener.scheduling = scheduling;
    }
    if let Some(max) = cli.max_connections {
        config.listener.max_connections = max;
    }
    if let Some(policy) = cli.method_policy {
        config.origin.method_policy = policy;
    }
    config.origin.base_url = config.origin.normalized_base().to_string();

    Ok(config)
}

/// Remove every persisted entry and report how many were removed.
async fn clear_cache(config: &ProxyConfig, out: &mut impl Write) -> Result<(), String> {
    let failed = |e: &dyn std::fmt::Display| {
        format!("failed to clear cache at {}: {}", config.cache.dir.display(), e)
    };

    if config.cache.backend == CacheBackend::Memory {
        writeln!(out, "Memory cache has no persistent entries; nothing to clear.").map_err(|e| failed(&e))?;
        return Ok(());
    }

    let store = DiskStore::open(&config.cache.dir).map_err(|e| failed(&e))?;
    let removed = store.clear().await.map_err(|e| failed(&e))?;
    tracing::info!(removed, dir = %config.cache.dir.display(), "Cache cleared");
    writeln!(out, "Cache cleared ({} entries removed).", removed).map_err(|e| failed(&e))
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        port = config.listener.port,
        origin = %config.origin.base_url,
        scheduling = %config.listener.scheduling,
        method_policy = ?config.origin.method_policy,
        cache_backend = ?config.cache.backend,
        cache_dir = %config.cache.dir.display(),
        "caching-proxy v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(&config.listener).await?;
    let origin = OriginClient::new(&config.origin);

    match config.cache.backend {
        CacheBackend::Disk => {
            let store = DiskStore::open(&config.cache.dir)?;
            serve(listener, ConnectionHandler::from_config(store, origin, &config)).await
        }
        CacheBackend::Memory => {
            serve(listener, ConnectionHandler::from_config(MemoryStore::new(), origin, &config)).await
        }
    }
}

async fn serve<S, O>(
    listener: Listener,
    handler: ConnectionHandler<S, O>,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: CacheStore,
    O: Origin,
{
    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move { shutdown_on_signal(&shutdown).await });

    listener.run(Arc::new(handler), stop).await?;
    Ok(())
}
