// src/api/mod.rs
// HTTP surface: a turn-processing endpoint plus the operational endpoints
// (health, metrics) every service in this codebase ships. This is
// infrastructure plumbing, not the product "web UI" the source spec
// excludes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::scheduler::{RoutingScheduler, TurnContext};

pub struct AppState {
    pub scheduler: Arc<RoutingScheduler>,
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub referenced_user: Option<String>,
    #[serde(default)]
    pub viewed_ids: Vec<String>,
    /// Already-swiped-away user ids. Excluded post-retrieval, distinct from
    /// `viewed_ids` which are excluded at the vector store filter stage.
    #[serde(default)]
    pub swiped_ids: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/v1/turn", post(turn_handler))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn turn_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TurnRequest>,
) -> impl IntoResponse {
    let ctx = TurnContext {
        user_id: request.user_id,
        referenced_user: request.referenced_user,
        viewed_ids: request.viewed_ids,
        swiped_ids: request.swiped_ids,
    };

    let result = state.scheduler.process_turn(&request.message, ctx).await;
    (StatusCode::OK, Json(result))
}
