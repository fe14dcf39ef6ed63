//! Per-host worker statistics

use axum::{Json, Router, extract::State, routing::get};

use crate::state::AppState;

use super::types::HostsResponse;

/// GET /api/v1/hosts
async fn list_hosts(State(state): State<AppState>) -> Json<HostsResponse> {
    let hosts = state.dispatcher.host_stats();

    Json(HostsResponse {
        count: hosts.len(),
        hosts,
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/hosts", get(list_hosts))
}
