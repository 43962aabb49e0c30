use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use backend_lib::{config::Settings, router, AppState};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

/// Bookstore session and credential service
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load_from(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    init_tracing(&settings);

    let state = Arc::new(AppState::new(&settings));

    // Expiry is enforced at read time; this only keeps the stores small.
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(15 * 60));
        loop {
            interval.tick().await;
            match sessions.purge_expired().await {
                Ok(purged) => tracing::debug!(purged, "expired tokens purged"),
                Err(e) => tracing::warn!(error = %e, "token purge failed"),
            }
        }
    });

    let rate_limiter = state.sessions.rate_limiter().clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            rate_limiter.cleanup();
        }
    });

    let app = router::create_router(state);

    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
