//! # coldtrace-server
//!
//! HTTP server for the coldtrace sensor ingestion service.
//!
//! This binary provides:
//! - Ingestion of raw BLE manufacturer-data records from gateways
//! - The most recent persisted readings
//! - A live WebSocket feed of decoded readings
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! COLDTRACE__STORAGE__BACKEND=memory cargo run --package coldtrace-server
//!
//! # Production
//! COLDTRACE_CONFIG=/etc/coldtrace/config.toml ./coldtrace-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use coldtrace_core::Config;
use coldtrace_server::{api, logging, state::AppState};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    logging::init(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting coldtrace-server");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config)?;
    let app = api::create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
