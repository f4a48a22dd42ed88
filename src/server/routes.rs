use crate::aggregator::DashboardView;
use crate::db;
use crate::errors::AggregatorError;
use crate::pnl::rollup::{self, Period};
use crate::pnl::Entity;
use crate::state::{AppState, WsMessage};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use std::sync::Arc;

type ApiResponse = (StatusCode, Json<serde_json::Value>);

#[derive(serde::Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub capital: Option<f64>,
}

#[derive(serde::Deserialize)]
pub struct UpdateRequest {
    pub name: Option<String>,
    pub capital: Option<f64>,
}

#[derive(serde::Deserialize)]
pub struct ViewQuery {
    /// Comma-separated entity ids; all registered entities when absent.
    pub ids: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct RollupQuery {
    pub ids: Option<String>,
    pub period: Option<String>,
    /// Drop Saturday/Sunday entries before bucketing.
    #[serde(default)]
    pub weekdays: bool,
}

fn error_response(e: AggregatorError) -> ApiResponse {
    let status = match e {
        AggregatorError::InvalidCapital(_) | AggregatorError::InvalidEntity(_) => StatusCode::BAD_REQUEST,
        AggregatorError::UnknownEntity(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

/// Comma-separated ids, first occurrence wins. A selection never counts an entity twice.
fn parse_ids(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn select_entities(state: &AppState, ids: Option<&str>) -> Result<Vec<Entity>, AggregatorError> {
    match ids {
        Some(raw) => db::get_entities(&state.db, &parse_ids(raw)),
        None => db::list_entities(&state.db),
    }
}

/// Build a view for `entities` and write discovered names back to the registry.
/// Only `publish` views replace the shared snapshot and reach WS clients.
pub async fn load_and_correct(state: &AppState, entities: &[Entity], publish: bool) -> DashboardView {
    let today = chrono::Local::now().date_naive();
    let view = if publish {
        state.aggregator.publish_view(entities, today).await
    } else {
        state.aggregator.load_view(entities, today).await
    };
    state.record_view(&view);

    for correction in &view.name_corrections {
        match db::update_entity(&state.db, &correction.entity_id, Some(&correction.name), None) {
            Ok(entity) => {
                tracing::info!(entity = %entity.id, name = %entity.name, "registry name corrected");
                state.broadcast(WsMessage::EntityUpdated { entity });
            }
            Err(e) => tracing::warn!(entity = %correction.entity_id, error = %e, "name correction failed"),
        }
    }
    view
}

/// GET /api/entities -- registry listing
pub async fn list_entities(State(state): State<Arc<AppState>>) -> ApiResponse {
    match db::list_entities(&state.db) {
        Ok(entities) => (StatusCode::OK, Json(serde_json::json!({ "entities": entities }))),
        Err(e) => error_response(e),
    }
}

/// POST /api/entities -- register a new entity
pub async fn register_entity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResponse {
    let capital = req.capital.unwrap_or(state.config.default_capital);
    match db::register_entity(&state.db, &req.name, req.url.trim(), capital) {
        Ok(entity) => (StatusCode::CREATED, Json(serde_json::json!(entity))),
        Err(e) => error_response(e),
    }
}

/// PATCH /api/entities/{id} -- correct name and/or capital
pub async fn update_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> ApiResponse {
    match db::update_entity(&state.db, &id, req.name.as_deref(), req.capital) {
        Ok(entity) => {
            state.broadcast(WsMessage::EntityUpdated { entity: entity.clone() });
            (StatusCode::OK, Json(serde_json::json!(entity)))
        }
        Err(e) => error_response(e),
    }
}

/// POST /api/entities/{id}/refresh -- drop the cached series so the next view refetches
pub async fn refresh_entity(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResponse {
    if let Err(e) = db::get_entity(&state.db, &id) {
        return error_response(e);
    }
    match db::invalidate_cached_series(&state.db, &id) {
        Ok(invalidated) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": id, "invalidated": invalidated })),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/view -- combined dashboard view for a selection
pub async fn get_view(State(state): State<Arc<AppState>>, Query(params): Query<ViewQuery>) -> ApiResponse {
    let entities = match select_entities(&state, params.ids.as_deref()) {
        Ok(entities) => entities,
        Err(e) => return error_response(e),
    };
    // The all-entities view is the shared one; selections stay private to the caller.
    let view = load_and_correct(&state, &entities, params.ids.is_none()).await;
    (StatusCode::OK, Json(serde_json::json!(view)))
}

/// GET /api/rollups -- monthly or quarterly buckets for a selection
pub async fn get_rollups(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RollupQuery>,
) -> ApiResponse {
    let period = match params.period.as_deref().unwrap_or("monthly").parse::<Period>() {
        Ok(p) => p,
        Err(reason) => {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": reason })));
        }
    };
    let entities = match select_entities(&state, params.ids.as_deref()) {
        Ok(entities) => entities,
        Err(e) => return error_response(e),
    };

    let view = load_and_correct(&state, &entities, false).await;
    let buckets = if params.weekdays {
        rollup::rollup(&rollup::weekdays_only(&view.combined.daily), view.combined.capital, period)
    } else {
        rollup::rollup(&view.combined.daily, view.combined.capital, period)
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "period": match period {
                Period::Monthly => "monthly",
                Period::Quarterly => "quarterly",
            },
            "capital": view.combined.capital,
            "rollups": buckets,
            "errors": view.errors,
        })),
    )
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> ApiResponse {
    use portable_atomic::Ordering::Relaxed;
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "views_built": state.counters.views_built.load(Relaxed),
            "fetches": state.counters.fetches.load(Relaxed),
            "fetch_failures": state.counters.fetch_failures.load(Relaxed),
            "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
        })),
    )
}
