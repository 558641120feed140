pub mod chat;
pub mod health;
pub mod tools;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/v1/health", get(health::health))
        // Runs
        .route("/v1/chat", post(chat::chat))
        .route("/v1/chat/stream", post(chat::chat_stream))
        // Tool catalog + direct dispatch
        .route("/v1/tools", get(tools::list_tools))
        .route("/v1/tools/refresh", post(tools::refresh_tools))
        .route("/v1/tools/invoke", post(tools::invoke_tool))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
