use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// `GET /v1/health`: liveness plus a summary of what the runtime is wired to.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.cached();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.provider.provider_id(),
        "model": state.provider.default_model(),
        "storage": state.graph.base_url(),
        "tools": catalog.as_ref().map(|c| c.tools.len()),
        "synthesized_tools": catalog.as_ref().map(|c| c.synthesized_count()),
        "catalog_age_secs": catalog.as_ref().map(|c| c.age().as_secs()),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
