//! Chat API endpoints: one request, one bounded run.
//!
//! - `POST /v1/chat`        - batch: returns the outcome and execution log
//! - `POST /v1/chat/stream` - SSE: streams run events as they happen

use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use gw_domain::stream::TurnEvent;
use gw_domain::tool::{Message, Role};

use crate::runtime::{run_streaming, RunInput};
use crate::state::AppState;

use super::api_error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Single user message.
    #[serde(default)]
    pub message: Option<String>,
    /// Full seed conversation; takes precedence over `message`.
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// Named profile from `[profiles]`.
    #[serde(default)]
    pub profile: Option<String>,
    /// Identity forwarded to the storage service.
    #[serde(default)]
    pub caller: Option<String>,
}

/// Turn a request body into run input, or a client-facing error message.
pub(crate) fn run_input(state: &AppState, body: ChatRequest) -> Result<RunInput, String> {
    let messages = match (body.messages, body.message) {
        (Some(m), _) if !m.is_empty() => m,
        (_, Some(text)) if !text.trim().is_empty() => vec![Message::user(text)],
        _ => return Err("`message` or `messages` is required".into()),
    };
    if messages.last().map(|m| m.role) != Some(Role::User) {
        return Err("the conversation must end with a user message".into());
    }

    let mut profile = state
        .profile(body.profile.as_deref())
        .map_err(|e| e.to_string())?;
    if body.model.is_some() {
        profile.model = body.model;
    }

    Ok(RunInput {
        messages,
        profile,
        caller: body.caller,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat (batch)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> impl IntoResponse {
    let input = match run_input(&state, body) {
        Ok(i) => i,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e),
    };

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id, streaming = false, "otel.kind" = "SERVER");
    let (outcome, log) = state.engine.run_batch(input).instrument(span).await;

    Json(serde_json::json!({
        "run_id": run_id,
        "success": outcome.success,
        "turns": outcome.turns,
        "max_reached": outcome.max_reached,
        "content": outcome.content,
        "suggestions": outcome.suggestions,
        "usage": outcome.usage,
        "log": log.entries(),
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat/stream (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_stream(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> impl IntoResponse {
    let input = match run_input(&state, body) {
        Ok(i) => i,
        Err(e) => {
            // Keep the transport uniform: a single error event, then close.
            let event = TurnEvent::Error { error: e, stop_reason: None };
            let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(sse_event(&event)) });
            return Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
        }
    };

    let (run_id, rx) = run_streaming(state.engine.clone(), input);
    tracing::debug!(%run_id, "streaming run started");

    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn make_sse_stream(mut rx: mpsc::Receiver<TurnEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(sse_event(&event));
        }
    }
}

/// `event: <name>` + `data: <json payload>`.
pub(crate) fn sse_event(event: &TurnEvent) -> Event {
    Event::default().event(event.name()).data(event.payload().to_string())
}
