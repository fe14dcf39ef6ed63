//! Purge routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use purger_core::{
    HostKey, PathRewriter, PurgePaths, StaticPaths, VirtualHostRewriter, paths_to_purge,
    queue_purges,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{PurgePathsRequest, PurgePathsResponse, PurgeUrlRequest, QueuedResponse};

/// POST /api/v1/purge
async fn purge_url(
    State(state): State<AppState>,
    Json(request): Json<PurgeUrlRequest>,
) -> Result<Response, ApiError> {
    // Reject URLs the dispatcher could not route
    HostKey::from_url(&request.url)?;

    let verb = request
        .verb
        .unwrap_or_else(|| state.dispatcher.default_verb().to_string());

    if request.sync {
        info!("Purging {} ({})", request.url, verb);
        let outcome = state.dispatcher.purge_sync(&request.url, &verb).await;
        return Ok(Json(outcome).into_response());
    }

    state.dispatcher.purge_async(&request.url, &verb);
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            queued: request.url,
        }),
    )
        .into_response())
}

/// POST /api/v1/purge/paths
async fn purge_paths(
    State(state): State<AppState>,
    Json(request): Json<PurgePathsRequest>,
) -> Result<Json<PurgePathsResponse>, ApiError> {
    let settings = state.settings.settings();
    if !settings.enabled {
        return Err(ApiError::Disabled);
    }

    let verb = request
        .verb
        .unwrap_or_else(|| state.dispatcher.default_verb().to_string());

    let changed = StaticPaths {
        relative: request.relative_paths,
        absolute: request.absolute_paths,
    };
    let rewriter = request
        .virtual_host
        .map(|context| VirtualHostRewriter::new(context, Some(state.settings.clone())));

    let providers: [&dyn PurgePaths; 1] = [&changed];
    let paths: Vec<String> = paths_to_purge(
        &providers,
        rewriter.as_ref().map(|r| r as &dyn PathRewriter),
    )
    .collect();
    debug!("Resolved {} paths to purge", paths.len());

    let urls = queue_purges(&state.dispatcher, &settings, paths, &verb);

    Ok(Json(PurgePathsResponse { urls }))
}

/// Create purge routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/purge", post(purge_url))
        .route("/api/v1/purge/paths", post(purge_paths))
}
