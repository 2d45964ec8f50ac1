//! Health check endpoints
//!
//! Liveness plus a cheap gauge of what the relay is holding right now.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub relay: RelayGauge,
}

/// Live counts, without the per-transfer detail of `/api/v1/relay/stats`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayGauge {
    pub connections: usize,
    pub sessions: usize,
    pub receivers: usize,
    pub active_transfers: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let relay = state.relay();
    let directory = relay.directory().snapshot();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "relay-server",
        relay: RelayGauge {
            connections: directory.connections,
            sessions: directory.senders,
            receivers: directory.receivers,
            active_transfers: relay.ledger().active().len(),
        },
    })
}
