// src/main.rs

use axum::serve;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use watchlist_proxy::{run, AppError};

#[derive(Parser, Debug)]
#[command(name = "watchlist-proxy", about = "Resilient multi-key watchlist API proxy")]
struct Cli {
    /// Path to the optional YAML configuration file.
    #[arg(long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "received signal; shutting down") },
        () = terminate => { info!(signal = "SIGTERM", "received signal; shutting down") },
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let (app, config) = run(cli.config).await.map_err(|e| {
        eprintln!("application setup error: {e}");
        e
    })?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid listen address: {e}")))?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!(server.address = %addr, error = ?e, "failed to bind to address");
        AppError::from(e)
    })?;
    info!(server.address = %addr, "server listening");

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::from)?;

    info!("server shut down gracefully");
    Ok(())
}
