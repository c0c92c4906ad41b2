//! HTTP server for alert webhooks.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::dispatcher::{Dispatcher, Outcome};
use crate::error::{ConfigError, RemediationError};

/// Server state shared across handlers.
pub struct AppState {
    /// Alert pipeline
    pub dispatcher: Dispatcher,
    /// Inbound body limit
    pub max_body_bytes: usize,
}

impl AppState {
    /// Build state from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            dispatcher: Dispatcher::from_config(config)?,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    info!(addr = %addr, "Remediator webhook server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Alert webhook handler.
async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RemediationError> {
    let provided = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    state.dispatcher.authorize(provided)?;

    let response = match state.dispatcher.dispatch(&body).await? {
        Outcome::NotActionable => (
            StatusCode::OK,
            Json(json!({ "status": "Alert received, but not actionable" })),
        )
            .into_response(),
        Outcome::Triggered {
            identifier,
            request_id,
            submission,
        } => {
            let status = StatusCode::from_u16(submission.http_status).unwrap_or(StatusCode::OK);
            (
                status,
                Json(json!({
                    "status": "Workflow triggered",
                    "resource": identifier,
                    "request_id": request_id,
                    "argo_response": submission.json_body(),
                })),
            )
                .into_response()
        }
    };

    Ok(response)
}
