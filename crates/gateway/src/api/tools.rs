//! Tool catalog endpoints.
//!
//! - `GET  /v1/tools`         - current catalog with origins
//! - `POST /v1/tools/refresh` - force a rebuild from the API description
//! - `POST /v1/tools/invoke`  - dispatch one tool directly

use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use gw_domain::tool::ToolResult;
use gw_tools::{CatalogSnapshot, ToolContext};

use crate::state::AppState;

fn describe(snapshot: &CatalogSnapshot) -> Value {
    let mut tools: Vec<Value> = snapshot
        .tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "origin": snapshot.origin(&t.name),
            })
        })
        .collect();
    tools.extend(snapshot.native.iter().map(|n| {
        json!({ "name": n.name(), "origin": "native", "config": n })
    }));

    json!({
        "tools": tools,
        "count": tools.len(),
        "synthesized": snapshot.synthesized_count(),
        "age_secs": snapshot.age().as_secs(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.catalog.snapshot().await;
    Json(describe(&snapshot))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tools/refresh
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn refresh_tools(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.catalog.refresh().await;
    tracing::info!(tools = snapshot.tools.len(), "tool catalog refreshed via API");
    Json(describe(&snapshot))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tools/invoke
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ToolInvokeRequest {
    pub tool: String,
    #[serde(default, alias = "args")]
    pub input: Value,
    #[serde(default)]
    pub caller: Option<String>,
}

/// Always 200 with `ok: true/false` in the body; tool errors are not
/// HTTP errors.
pub async fn invoke_tool(State(state): State<AppState>, Json(req): Json<ToolInvokeRequest>) -> impl IntoResponse {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4();
    let snapshot = state.catalog.snapshot().await;
    let ctx = ToolContext::new(req.caller);

    let result = state
        .dispatcher
        .execute(&req.tool, &req.input, &ctx, &snapshot)
        .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        ToolResult::Success(value) => Json(json!({
            "request_id": request_id,
            "ok": true,
            "origin": snapshot.origin(&req.tool),
            "result": value,
            "duration_ms": duration_ms,
        })),
        ToolResult::Failure(message) => Json(json!({
            "request_id": request_id,
            "ok": false,
            "origin": snapshot.origin(&req.tool),
            "error": message,
            "duration_ms": duration_ms,
        })),
    }
}
