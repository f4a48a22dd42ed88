pub mod routes;
pub mod ws;

use crate::aggregator::DashboardView;
use crate::db;
use crate::errors::AggregatorResult;
use crate::state::AppState;
use axum::routing::{get, patch, post};
use std::sync::Arc;

/// HTTP + WS surface for the dashboard.
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/entities", get(routes::list_entities).post(routes::register_entity))
        .route("/api/entities/{id}", patch(routes::update_entity))
        .route("/api/entities/{id}/refresh", post(routes::refresh_entity))
        .route("/api/view", get(routes::get_view))
        .route("/api/rollups", get(routes::get_rollups))
        .route("/api/counters", get(routes::get_counters))
        .route("/ws", get(ws::ws_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

/// One refresher tick: rebuild the all-entities view and publish it.
/// `None` when nothing is registered yet.
pub async fn refresh_once(state: &AppState) -> AggregatorResult<Option<DashboardView>> {
    let entities = db::list_entities(&state.db)?;
    if entities.is_empty() {
        tracing::debug!("no entities registered, skipping refresh");
        return Ok(None);
    }
    let view = routes::load_and_correct(state, &entities, true).await;
    tracing::info!(
        loaded = view.loaded,
        failed = view.errors.len(),
        "scheduled refresh complete"
    );
    Ok(Some(view))
}
