//! Cache Purger - Queued HTTP purging of caching proxies

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig};
use purger_api::{AppState, create_router};
use purger_core::{InMemorySettingsProvider, PurgeDispatcher, PurgeStatus};

/// Cache Purger - Sends purge requests to caching proxies, one queue per host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "CACHE_PURGER_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "CACHE_PURGER_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the purge API server (default)
    Serve,

    /// Purge URLs right away and print the proxy's answer for each
    Purge {
        /// URLs to purge
        #[arg(required = true)]
        urls: Vec<String>,

        /// HTTP method; defaults to the configured verb
        #[arg(long)]
        verb: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging)?;

    match args.command {
        Some(Command::Purge { urls, verb }) => purge(config, urls, verb).await,
        Some(Command::Serve) | None => serve(config, args.bind, args.port).await,
    }
}

async fn serve(config: Config, bind: Option<String>, port: Option<u16>) -> Result<()> {
    info!("Starting Cache Purger v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let dispatcher = Arc::new(PurgeDispatcher::with_http(config.purger.clone())?);
    let settings = Arc::new(InMemorySettingsProvider::new(config.purging.clone()));

    if config.purging.caching_proxies.is_empty() {
        warn!("No caching proxies configured; path purges will not be sent anywhere");
    }
    for proxy in &config.purging.caching_proxies {
        info!("Caching proxy: {}", proxy);
    }

    let state = AppState::new(dispatcher.clone(), settings);

    // Create router
    let app = create_router(state, Some(Arc::new(metrics_handle)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = bind.unwrap_or(config.server.bind_address);
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, stopping purge workers");
    if !dispatcher.stop(true).await {
        warn!("Some purge workers did not stop in time");
    }

    Ok(())
}

/// One-shot synchronous purge of each URL
async fn purge(config: Config, urls: Vec<String>, verb: Option<String>) -> Result<()> {
    let dispatcher = PurgeDispatcher::with_http(config.purger)?;
    let verb = verb.unwrap_or_else(|| dispatcher.default_verb().to_string());

    let mut failed = 0;
    for url in &urls {
        let outcome = dispatcher.purge_sync(url, &verb).await;
        if outcome.status == PurgeStatus::Error {
            failed += 1;
        }

        println!("{} {} {}", outcome.status, verb, url);
        if !outcome.x_cache.is_empty() {
            println!("  {}: {}", dispatcher.config().cache_header, outcome.x_cache);
        }
        if !outcome.x_error.is_empty() {
            println!("  error: {}", outcome.x_error);
        }
    }

    if failed > 0 {
        bail!("{} of {} purges failed", failed, urls.len());
    }
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
