//! earmark - write-through content gateway.
//!
//! Serve mode (default): answer `(Host, path)` requests with redirects to
//! content identifiers, ingesting unstamped files on first sight and,
//! unless disabled, on every observed close-after-write.
//!
//! Bootstrap mode (`--bootstrap <dir>`): one warm-up pass over an existing
//! tree instead of serving, then exit.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use caslink::CasClient;
use clap::Parser;
use pathmark::{PathCache, XattrCache};
use tokio_util::sync::CancellationToken;

use earmark::bootstrap;
use earmark::config::GatewayConfig;
use earmark::gateway::{self, GatewayState};
use earmark::ingest::Ingestor;
use earmark::watch;

#[derive(Parser, Debug)]
#[command(name = "earmark", version, about)]
struct Cli {
    /// Backend node API endpoint
    #[arg(long, default_value = "http://daemon:5001", env = "EARMARK_API")]
    api: String,

    /// Public base URL redirects are built against
    #[arg(long, default_value = "https://gateway.ipfs.io", env = "EARMARK_BASE_URL")]
    baseurl: String,

    /// Directory files are served from
    #[arg(long, default_value = "/data", env = "EARMARK_BASE_DIR")]
    basedir: PathBuf,

    /// Retrieval path prefix used in redirects
    #[arg(long, default_value = "/ipfs")]
    prefix: String,

    /// Backend storage subtree under the serving root, never ingested
    #[arg(long, default_value = "ipfs")]
    reserved: String,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8089", env = "EARMARK_LISTEN")]
    listen: SocketAddr,

    /// Disable the close-write watcher
    #[arg(long)]
    no_watch: bool,

    /// Skip mirroring ingested files into the backend's mutable namespace
    #[arg(long)]
    no_mfs: bool,

    /// Cache-Control header for redirects
    #[arg(long, default_value = "public, max-age=31536000, immutable")]
    cache_hit: String,

    /// Cache-Control header for misses and errors
    #[arg(long, default_value = "private, max-age=0, stale-while-revalidate=300")]
    cache_miss: String,

    /// Ingest every file under this tree and exit instead of serving
    #[arg(long)]
    bootstrap: Option<PathBuf>,
}

impl Cli {
    fn into_parts(self) -> (Option<PathBuf>, GatewayConfig) {
        let reserved_dir = self.basedir.join(&self.reserved);
        let config = GatewayConfig {
            api_endpoint: self.api,
            base_url: self.baseurl,
            base_dir: self.basedir,
            prefix: self.prefix,
            reserved_dir,
            watch: !self.no_watch,
            mfs: !self.no_mfs,
            cache_hit: self.cache_hit,
            cache_miss: self.cache_miss,
            listen: self.listen,
        };
        (self.bootstrap, config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let (bootstrap_root, config) = cli.into_parts();
    let config = Arc::new(config);

    let cache: Arc<dyn PathCache> = Arc::new(XattrCache::default());
    let client = CasClient::new(config.api_endpoint.clone());
    let ingestor = Arc::new(Ingestor::new(client, Arc::clone(&cache), config.mfs));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    if let Some(root) = bootstrap_root {
        let report =
            bootstrap::run(root.clone(), config.reserved_dir.clone(), ingestor, shutdown).await;
        for (path, error) in &report.failures {
            tracing::warn!(path = %path.display(), error = %error, "bootstrap failure");
        }
        tracing::info!(
            root = %root.display(),
            ingested = report.ingested,
            failures = report.failures.len(),
            "bootstrap complete"
        );
        return Ok(());
    }

    tracing::info!("📦 earmark gateway starting");
    tracing::info!("   API endpoint: {}", config.api_endpoint);
    tracing::info!("   Serving root: {}", config.base_dir.display());
    tracing::info!("   Redirect base: {}{}", config.base_url, config.prefix);

    let _watch_task = if config.watch {
        Some(
            watch::spawn(Arc::clone(&config), Arc::clone(&ingestor), shutdown.clone())
                .context("failed to start close-write watcher")?,
        )
    } else {
        None
    };

    let state = GatewayState {
        config: Arc::clone(&config),
        cache,
        ingestor,
        shutdown: shutdown.clone(),
        started: Instant::now(),
    };

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    tracing::info!("🌐 listening on {}", config.listen);

    axum::serve(listener, gateway::router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    Ok(())
}
