//! The webhook HTTP server: `POST /webhook/alerts` (Alertmanager receiver)
//! and `GET /healthz`. Grounded in the teacher's AG-UI server's `Router` +
//! `with_state` + `axum::serve` shape, adapted from SSE/WS routes to a
//! single JSON receiver (see `DESIGN.md`).

use crate::config::Config;
use crate::ingest::webhook::{handle_webhook_payload, AlertmanagerWebhookPayload};
use crate::pipeline::evidence::ProviderBundle;
use crate::providers::queue::QueueClient;
use crate::storage::CaseStore;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
struct ServerState {
    config: Arc<Config>,
    case_store: Arc<CaseStore>,
    queue: Arc<QueueClient>,
    allowlist: Arc<Option<HashSet<String>>>,
}

/// Build the router and serve it until the process is killed. `providers` is
/// accepted for symmetry with [`crate::worker::run_worker`] even though the
/// webhook path itself never collects evidence — only the worker does.
pub async fn run_server(
    config: Config,
    _providers: Arc<ProviderBundle>,
    case_store: Arc<CaseStore>,
    queue: Arc<QueueClient>,
    host: Option<String>,
    port: Option<u16>,
) -> crate::Result<()> {
    let bind_host = host.unwrap_or_else(|| config.server.host.clone());
    let bind_port = port.unwrap_or(config.server.port);
    let allowlist = Arc::new(crate::ingest::webhook::allowlist_from_env());

    let state = ServerState { config: Arc::new(config), case_store, queue, allowlist };

    let app = Router::new()
        .route("/webhook/alerts", post(receive_webhook))
        .route("/healthz", get(healthz))
        .with_state(state);

    let addr: SocketAddr = format!("{bind_host}:{bind_port}")
        .parse()
        .map_err(|e| crate::AgentError::Config(format!("invalid bind address {bind_host}:{bind_port}: {e}")))?;

    info!(%addr, "webhook server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn receive_webhook(State(state): State<ServerState>, Json(payload): Json<AlertmanagerWebhookPayload>) -> Response {
    let allowlist = state.allowlist.as_ref().as_ref();
    match handle_webhook_payload(payload, allowlist, &state.config.dedup, &state.case_store, &state.queue).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            error!(error = %e, "webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
