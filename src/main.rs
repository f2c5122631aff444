//! Delta Proxy Server
//!
//! Caching reverse proxy for time-series backends.
//!
//! Run with: cargo run -- --config config.toml
//!
//! # Configuration
//!
//! Settings are read from `--config`, or the first of
//! `~/.config/deltaproxy/config.toml`, `/etc/deltaproxy/config.toml` and
//! `./config.toml`. `DELTAPROXY_*` environment variables override the file;
//! `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deltaproxy::api::{serve, AppState};
use deltaproxy::cache::MemoryCache;
use deltaproxy::config::{generate_default_config, Config, LoggingConfig};
use deltaproxy::engine::DeltaProxyCache;
use deltaproxy::origin::{Backend, HttpOrigin, IronDbBackend};

#[derive(Parser)]
#[command(name = "deltaproxy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Delta proxy cache for time-series backends")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging);
    tracing::info!("Starting delta proxy v{}", env!("CARGO_PKG_VERSION"));

    let backend: Arc<dyn Backend> = match config.origin.backend.as_str() {
        "irondb" => Arc::new(IronDbBackend::new()),
        other => anyhow::bail!("unsupported origin backend: {}", other),
    };

    let origin = Arc::new(
        HttpOrigin::new(config.origin_config(), Arc::clone(&backend))
            .context("building origin client")?,
    );
    tracing::info!(url = %config.origin.url, backend = %backend.name(), "Origin configured");

    let cache = Arc::new(MemoryCache::new(config.cache_config()));
    let engine = DeltaProxyCache::new(
        backend,
        origin.clone(),
        cache.clone(),
        config.engine_config(),
    );

    let api_config = config.api_config();
    let state = AppState::new(Arc::new(engine), origin, cache, api_config.clone());

    serve(state, &api_config).await?;

    tracing::info!("Delta proxy stopped");
    Ok(())
}

/// Install the tracing subscriber; `RUST_LOG` wins over the configured level
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "deltaproxy={level},tower_http={level}",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
