//! Relay Routes
//!
//! The WebSocket endpoint clients connect to, plus read-only HTTP views of
//! the relay's state.
//!
//! Endpoints:
//! - GET /ws - Upgrade to the relay protocol
//! - GET /api/v1/relay/config - Chunk size and message limit for clients
//! - GET /api/v1/relay/stats - Connection counts, orphans, transfers
//! - GET /api/v1/relay/sessions/:session_id - One session's participants
//! - GET /api/v1/relay/sessions/:session_id/receivers - Check for receivers

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::relay::{serve_socket, ConnectionId, RelayStats, SessionSummary};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfigResponse {
    pub chunk_size: u64,
    pub max_message_bytes: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiversResponse {
    pub session_id: String,
    pub has_receivers: bool,
    pub receiver_id: Option<String>,
    pub connection_id: Option<ConnectionId>,
    pub count: usize,
}

// ============================================================================
// Router
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(relay_config))
        .route("/stats", get(relay_stats))
        .route("/sessions/:session_id", get(get_session))
        .route("/sessions/:session_id/receivers", get(check_receivers))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let limit = state.config().relay.max_message_bytes;
    let relay = state.relay().clone();

    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| serve_socket(socket, relay))
}

/// GET /api/v1/relay/config
async fn relay_config(State(state): State<AppState>) -> Json<RelayConfigResponse> {
    let relay = &state.config().relay;
    Json(RelayConfigResponse {
        chunk_size: relay.default_chunk_size,
        max_message_bytes: relay.max_message_bytes,
    })
}

/// GET /api/v1/relay/stats
async fn relay_stats(State(state): State<AppState>) -> Json<RelayStats> {
    let stats = state.relay().stats();
    if !stats.directory.orphaned_receivers.is_empty() {
        tracing::debug!(
            orphaned = stats.directory.orphaned_receivers.len(),
            "Receivers waiting on sessions with no sender"
        );
    }
    Json(stats)
}

/// GET /api/v1/relay/sessions/:session_id
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>> {
    state
        .relay()
        .session(&session_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {}", session_id)))
}

/// GET /api/v1/relay/sessions/:session_id/receivers
async fn check_receivers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReceiversResponse>> {
    if session_id.trim().is_empty() {
        return Err(AppError::BadRequest("sessionId must not be blank".to_string()));
    }

    let receivers = state.relay().directory().receivers_of(&session_id);
    let first = receivers.first();

    Ok(Json(ReceiversResponse {
        has_receivers: first.is_some(),
        receiver_id: first.map(|a| a.receiver_id.clone()),
        connection_id: first.map(|a| a.connection_id),
        count: receivers.len(),
        session_id,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::Value;

    use crate::config::Config;
    use crate::relay::{Outbox, Relay};
    use crate::routes::app;
    use crate::state::AppState;

    fn server_with(relay: Relay) -> TestServer {
        TestServer::new(app(AppState::with_relay(Config::default(), relay))).unwrap()
    }

    #[tokio::test]
    async fn test_relay_config() {
        let server = server_with(Relay::new());
        let body: Value = server.get("/api/v1/relay/config").await.json();
        assert_eq!(body["chunkSize"], 65_536);
        assert_eq!(body["maxMessageBytes"], 100 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let server = server_with(Relay::new());
        let response = server.get("/api/v1/relay/sessions/nope").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_session_and_receivers() {
        let relay = Relay::new();
        let (sender_box, _sender_rx) = Outbox::channel();
        let (receiver_box, _receiver_rx) = Outbox::channel();
        let sender = relay.connect(sender_box);
        let receiver = relay.connect(receiver_box);
        relay
            .directory()
            .register_sender(sender, "S1", None, Vec::new());
        relay
            .directory()
            .attach_receiver(receiver, "S1", "r-1", None);

        let server = server_with(relay);

        let session: Value = server.get("/api/v1/relay/sessions/S1").await.json();
        assert_eq!(session["sessionId"], "S1");
        assert_eq!(session["receivers"].as_array().unwrap().len(), 1);

        let receivers: Value = server.get("/api/v1/relay/sessions/S1/receivers").await.json();
        assert_eq!(receivers["hasReceivers"], true);
        assert_eq!(receivers["receiverId"], "r-1");
        assert_eq!(receivers["connectionId"], receiver.to_string());

        let empty: Value = server.get("/api/v1/relay/sessions/S2/receivers").await.json();
        assert_eq!(empty["hasReceivers"], false);
        assert_eq!(empty["count"], 0);
    }

    #[tokio::test]
    async fn test_stats_lists_orphans() {
        let relay = Relay::new();
        let (outbox, _rx) = Outbox::channel();
        let receiver = relay.connect(outbox);
        relay
            .directory()
            .attach_receiver(receiver, "lonely", "r-1", None);

        let server = server_with(relay);
        let stats: Value = server.get("/api/v1/relay/stats").await.json();

        assert_eq!(stats["directory"]["connections"], 1);
        assert_eq!(stats["directory"]["senders"], 0);
        let orphans = stats["directory"]["orphanedReceivers"].as_array().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0]["sessionId"], "lonely");
    }
}
