//! peercache node
//!
//! Runs one member of a peercache cluster serving the demo `scores` group.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         peercache node                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  API server  │───▶│    Group     │◀───│ Peer server  │◀── peers
//! │  │   (:9999)    │    │   "scores"   │    │   (:8001)    │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             │ HttpPool                          │
//! │                             ▼                                   │
//! │                      remote peers / slow DB                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Start three nodes, one with the API enabled:
//!
//! ```text
//! peercache --port 8001
//! peercache --port 8002
//! peercache --port 8003 --api
//! curl 'http://localhost:9999/api?key=Tom'
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peercache::cache::DEFAULT_CACHE_BYTES;
use peercache::peers::DEFAULT_REPLICAS;
use peercache::server::{self, Api};
use peercache::{
    Error, GetterFunc, Group, GroupRegistry, HttpPool, MetricsExporter, PoolConfig, Result,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// peercache - distributed in-memory cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Peer server port
    #[arg(long, env = "PEERCACHE_PORT", default_value = "8001")]
    port: u16,

    /// Cluster members, comma-separated (including this node)
    #[arg(
        long,
        env = "PEERCACHE_PEERS",
        value_delimiter = ',',
        default_value = "http://localhost:8001,http://localhost:8002,http://localhost:8003"
    )]
    peers: Vec<String>,

    /// Start the front-end API server
    #[arg(long, env = "PEERCACHE_API")]
    api: bool,

    /// API server bind address
    #[arg(long, env = "PEERCACHE_API_ADDR", default_value = "0.0.0.0:9999")]
    api_addr: String,

    /// Local cache size in bytes for the demo group (0 = unbounded)
    #[arg(long, env = "PEERCACHE_CACHE_BYTES", default_value_t = DEFAULT_CACHE_BYTES)]
    cache_bytes: u64,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, env = "PEERCACHE_REPLICAS", default_value_t = DEFAULT_REPLICAS)]
    replicas: usize,

    /// Peer fetch timeout in milliseconds
    #[arg(long, env = "PEERCACHE_PEER_TIMEOUT_MS", default_value = "5000")]
    peer_timeout_ms: u64,

    /// Metrics server bind address (disabled if unset)
    #[arg(long, env = "PEERCACHE_METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let self_addr = format!("http://localhost:{}", args.port);
    info!("Starting peercache node");
    info!("  Self address: {}", self_addr);
    info!("  Peers: {}", args.peers.join(","));
    info!("  Cache bytes: {}", args.cache_bytes);
    info!("  Replicas: {}", args.replicas);

    let groups = Arc::new(GroupRegistry::new());
    let scores = create_scores_group(&groups, args.cache_bytes)?;

    let pool_config = PoolConfig {
        replicas: args.replicas,
        request_timeout: Duration::from_millis(args.peer_timeout_ms),
        ..Default::default()
    };
    let pool = Arc::new(HttpPool::with_config(self_addr, Arc::clone(&groups), pool_config)?);
    pool.set(args.peers.iter().map(|p| p.trim()).filter(|p| !p.is_empty()));
    scores.register_peers(pool.clone())?;

    // Start API server
    if args.api {
        let listener = server::bind(&args.api_addr).await?;
        let api = Arc::new(Api::new(Arc::clone(&scores), Arc::clone(&groups)));
        tokio::spawn(async move {
            if let Err(e) = server::serve_api(listener, api).await {
                error!("API server error: {}", e);
            }
        });
    }

    // Start metrics server
    if let Some(metrics_addr) = &args.metrics_addr {
        let listener = server::bind(metrics_addr).await?;
        let exporter = MetricsExporter::new(Arc::clone(&groups));
        tokio::spawn(async move {
            if let Err(e) = server::serve_metrics(listener, exporter).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Run the peer server
    let listener = server::bind(&format!("0.0.0.0:{}", args.port)).await?;
    tokio::select! {
        result = server::serve_peers(listener, pool) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| {
                Error::Internal(format!("Failed to listen for shutdown signal: {}", e))
            })?;
            info!("Shutdown signal received");
        }
    }

    info!("Node shutdown complete");
    Ok(())
}

// =============================================================================
// Demo Group
// =============================================================================

fn create_scores_group(groups: &GroupRegistry, cache_bytes: u64) -> Result<Arc<Group>> {
    let db: HashMap<&'static str, &'static str> =
        HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);

    groups.new_group(
        "scores",
        cache_bytes,
        GetterFunc::new(move |key: &str| {
            info!("[SlowDB] search key {}", key);
            db.get(key)
                .map(|v| v.as_bytes().to_vec())
                .ok_or_else(|| format!("{} not exist", key))
        }),
    )
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_library_defaults() {
        let args = Args::try_parse_from(["peercache"]).unwrap();

        assert_eq!(args.cache_bytes, DEFAULT_CACHE_BYTES);
        assert_eq!(args.cache_bytes, 2048);
        assert_eq!(args.replicas, DEFAULT_REPLICAS);
        assert_eq!(args.peers.len(), 3);
        assert!(!args.api);
    }

    #[test]
    fn test_peers_are_comma_separated() {
        let args = Args::try_parse_from([
            "peercache",
            "--peers",
            "http://a:8001,http://b:8002",
            "--cache-bytes",
            "0",
        ])
        .unwrap();

        assert_eq!(args.peers, vec!["http://a:8001", "http://b:8002"]);
        assert_eq!(args.cache_bytes, 0);
    }
}
