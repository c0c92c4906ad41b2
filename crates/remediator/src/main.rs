//! Remediator service binary.
//!
//! Standalone HTTP service that turns security alerts into Argo Workflows.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use remediator::{server, AppState, Args, Config};

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "remediator=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = Config::from_args(args).context("Invalid configuration")?;

    info!(
        listen_addr = %config.listen_addr,
        argo_workflow_api = %config.argo_workflow_api,
        mode = config.mode.as_str(),
        trigger_priority = %config.policy.trigger_priority,
        identifier_path = %config.policy.identifier_path,
        secret_check = config.webhook_secret.is_some(),
        token_path = %config.token_path.display(),
        "Remediator configured"
    );

    if !config.token_path.exists() {
        warn!(
            token_path = %config.token_path.display(),
            "Token file not present yet; matched alerts will fail until it appears"
        );
    }

    let state = Arc::new(AppState::from_config(&config).context("Failed to build server state")?);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    server::serve(listener, state, shutdown_signal())
        .await
        .context("Webhook server failed")?;

    info!("Remediator stopped");
    Ok(())
}

/// Text logs by default, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
