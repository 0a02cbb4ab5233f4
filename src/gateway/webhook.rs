//! HTTP surface: the WhatsApp webhook (handshake and delivery) and a health check.

use super::Gateway;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use relay_core::config::ServerConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Subscription handshake query (`GET /webhook`).
#[derive(Debug, Default, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

#[derive(Clone)]
struct WebhookState {
    gateway: Arc<Gateway>,
    verify_token: Arc<str>,
}

/// Constant-time string comparison so the verify token cannot be guessed by timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// `GET /webhook`: echo the challenge when mode and token match.
///
/// A query that does not parse is treated as empty and rejected with 403.
async fn verify(
    State(state): State<WebhookState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Response {
    let q = query.map(|Query(q)| q).unwrap_or_default();
    let token_ok = !state.verify_token.is_empty()
        && q.verify_token
            .as_deref()
            .is_some_and(|t| constant_time_eq(t, &state.verify_token));

    if q.mode.as_deref() == Some("subscribe") && token_ok {
        info!("webhook: subscription verified");
        return (StatusCode::OK, q.challenge.unwrap_or_default()).into_response();
    }

    warn!("webhook: verification rejected");
    (StatusCode::FORBIDDEN, "Verification token mismatch").into_response()
}

/// `POST /webhook`: process one event delivery.
async fn receive(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.gateway.handle_delivery(&body).await {
        Ok(status) => Ok(Json(json!({"status": status.as_str()}))),
        Err(e) => {
            error!("webhook: delivery failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "detail": e.to_string()})),
            ))
        }
    }
}

/// `GET /health`: liveness with uptime and in-memory ledger sizes.
async fn health(State(state): State<WebhookState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.gateway.uptime.elapsed().as_secs(),
        "contacts_tracked": state.gateway.state.contact_count(),
        "messages_seen": state.gateway.state.processed_count(),
    }))
}

pub(super) fn build_router(gateway: Arc<Gateway>, server: &ServerConfig) -> Router {
    let state = WebhookState {
        gateway,
        verify_token: Arc::from(server.verify_token.as_str()),
    };
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
        .with_state(state)
}

/// Bind and serve until Ctrl-C. Called from `Gateway::run()`.
pub(super) async fn serve(gateway: Arc<Gateway>, server: &ServerConfig) -> anyhow::Result<()> {
    let app = build_router(gateway, server);
    let addr = format!("{}:{}", server.host, server.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("webhook server failed to bind to {addr}: {e}"))?;

    info!("Webhook server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {e}");
            }
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!("webhook server error: {e}"))
}
