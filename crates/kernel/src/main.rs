//! Quire blog server.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use quire_kernel::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Quire");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let app = quire_kernel::app(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    let (drained_tx, drained_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(
        state.clone(),
        config.shutdown_timeout,
        drained_rx,
    ));

    let result = server.await.context("server error");
    // The watchdog only needs to fire when draining hangs
    drop(drained_tx);
    result?;

    info!("Server stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM after flagging the state as draining.
///
/// Once the signal arrives a watchdog exits the process if in-flight
/// requests have not finished within `timeout`.
async fn shutdown_signal(
    state: AppState,
    timeout: Duration,
    drained: tokio::sync::oneshot::Receiver<()>,
) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
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
                warn!(error = %e, "failed to listen for SIGTERM");
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

    state.begin_shutdown();
    info!(timeout_secs = timeout.as_secs(), "Shutdown signal received, draining");

    tokio::spawn(async move {
        if tokio::time::timeout(timeout, drained).await.is_err() {
            warn!("in-flight requests did not drain in time, exiting");
            std::process::exit(1);
        }
    });
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
