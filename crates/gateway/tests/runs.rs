//! End-to-end runs against a scripted model and an in-memory storage
//! service, through both the engine and the HTTP API.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use gw_domain::config::{Config, GraphConfig};
use gw_domain::error::{Error, Result};
use gw_domain::stream::{TurnEvent, Usage};
use gw_domain::tool::{ContentPart, Message};
use gw_domain::turn::StopReason;
use gw_gateway::bootstrap;
use gw_gateway::runtime::{RunInput, TurnSink};
use gw_gateway::state::AppState;
use gw_providers::{ChatRequest, ChatResponse, LlmProvider};

// ── Storage service that records request timing ─────────────────────

#[derive(Debug, Clone)]
struct Hit {
    method: Method,
    path: String,
    status: u16,
    started: Instant,
    finished: Instant,
}

#[derive(Default)]
struct Storage {
    graphs: Mutex<HashMap<String, Value>>,
    hits: Mutex<Vec<Hit>>,
}

type Shared = Arc<Storage>;

const LATENCY: Duration = Duration::from_millis(50);

async fn get_graph(
    State(s): State<Shared>,
    Path(id): Path<String>,
) -> std::result::Result<Json<Value>, (StatusCode, Json<Value>)> {
    let started = Instant::now();
    tokio::time::sleep(LATENCY).await;
    let found = s.graphs.lock().get(&id).cloned();
    let status = if found.is_some() { 200 } else { 404 };
    s.hits.lock().push(Hit {
        method: Method::GET,
        path: format!("/api/graphs/{id}"),
        status,
        started,
        finished: Instant::now(),
    });
    found
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, Json(json!({"error": format!("graph {id} not found")}))))
}

async fn put_graph(State(s): State<Shared>, Path(id): Path<String>, Json(doc): Json<Value>) -> Json<Value> {
    let started = Instant::now();
    tokio::time::sleep(LATENCY).await;
    s.graphs.lock().insert(id.clone(), doc);
    s.hits.lock().push(Hit {
        method: Method::PUT,
        path: format!("/api/graphs/{id}"),
        status: 200,
        started,
        finished: Instant::now(),
    });
    Json(json!({ "saved": id }))
}

async fn openapi() -> Json<Value> {
    Json(json!({
        "openapi": "3.0.0",
        "paths": {
            "/api/graphs/{graph_id}": {
                "get": { "operationId": "getGraph" },
                "put": { "operationId": "saveGraph" }
            },
            "/api/stats": { "get": { "operationId": "getStats", "summary": "Storage statistics" } }
        }
    }))
}

async fn spawn_storage() -> (String, Shared) {
    let store: Shared = Arc::default();
    let app = Router::new()
        .route("/api/graphs/:graph_id", get(get_graph).put(put_graph))
        .route("/openapi.json", get(openapi))
        .with_state(store.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), store)
}

// ── Scripted model ──────────────────────────────────────────────────

struct ScriptedProvider {
    replies: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req);
        self.replies.lock().pop_front().ok_or_else(|| Error::Provider {
            provider: "scripted".into(),
            message: "script exhausted".into(),
        })
    }
    fn provider_id(&self) -> &str {
        "scripted"
    }
    fn default_model(&self) -> &str {
        "scripted-model"
    }
}

fn reply(stop: StopReason, content: Vec<ContentPart>) -> ChatResponse {
    ChatResponse {
        content,
        stop_reason: stop,
        usage: Some(Usage { prompt_tokens: 20, completion_tokens: 10, total_tokens: 30 }),
        model: "scripted-model".into(),
    }
}

fn tool_use(id: &str, name: &str, input: Value) -> ContentPart {
    ContentPart::ToolUse { id: id.into(), name: name.into(), input }
}

/// Creates a graph and a node in the same turn, then answers.
fn build_graph_script() -> Vec<ChatResponse> {
    vec![
        reply(
            StopReason::ToolUse,
            vec![
                ContentPart::text("Creating the graph."),
                // Listed node-first on purpose; phases decide the order.
                tool_use("t1", "create_node", json!({"graph_id": "rust", "label": "Ownership"})),
                tool_use("t2", "create_graph", json!({"title": "Rust", "graph_id": "rust"})),
            ],
        ),
        reply(StopReason::EndTurn, vec![ContentPart::text("Done: graph 'rust' with one node.")]),
    ]
}

async fn app_state(provider: Arc<ScriptedProvider>) -> (AppState, Shared) {
    let (base_url, store) = spawn_storage().await;
    let mut config = Config {
        graph: GraphConfig { base_url, ..Default::default() },
        ..Default::default()
    };
    config.engine.suggestions.enabled = false;
    let state = bootstrap::assemble(Arc::new(config), provider).await.unwrap();
    (state, store)
}

fn input(text: &str) -> RunInput {
    RunInput {
        messages: vec![Message::user(text)],
        profile: gw_domain::config::ResolvedProfile::from_engine(&Default::default()),
        caller: Some("tester".into()),
    }
}

struct Collect(Vec<TurnEvent>);

#[async_trait::async_trait]
impl TurnSink for Collect {
    async fn emit(&mut self, event: TurnEvent) {
        self.0.push(event);
    }
}

// ── Engine ──────────────────────────────────────────────────────────

#[tokio::test]
async fn graph_creation_finishes_before_dependent_tools_start() {
    let provider = ScriptedProvider::new(build_graph_script());
    let (state, store) = app_state(provider.clone()).await;

    let mut sink = Collect(Vec::new());
    let outcome = state.engine.run(input("Build me a graph about Rust"), &mut sink).await;

    assert!(outcome.success);
    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.content, "Done: graph 'rust' with one node.");

    let hits = store.hits.lock().clone();
    let graph_put = hits
        .iter()
        .find(|h| h.method == Method::PUT && h.path == "/api/graphs/rust")
        .expect("graph was saved");
    // create_graph: GET(404) + PUT; create_node: GET(200) + PUT.
    let node_get = hits
        .iter()
        .find(|h| h.method == Method::GET && h.status == 200)
        .expect("create_node read the graph");
    assert!(graph_put.finished <= node_get.started);

    let graph = store.graphs.lock().get("rust").cloned().unwrap();
    assert_eq!(graph["nodes"][0]["label"], "Ownership");

    // Results are reported in invocation order, not execution order.
    let results: Vec<(&str, bool)> = sink
        .0
        .iter()
        .filter_map(|e| match e {
            TurnEvent::ToolResult { id, success, .. } => Some((id.as_str(), *success)),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, ok)| *ok));

    let requests = provider.requests.lock();
    let fed_back = &requests[1].messages;
    let ids: Vec<&str> = match &fed_back.last().unwrap().content {
        gw_domain::tool::MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect(),
        other => panic!("expected tool results, got {other:?}"),
    };
    assert_eq!(ids, vec!["t1", "t2"]);
}

#[tokio::test]
async fn nodes_created_in_one_turn_are_all_stored() {
    let mut calls = vec![tool_use("g", "create_graph", json!({"title": "Rust", "graph_id": "rust"}))];
    for (i, label) in ["Ownership", "Borrowing", "Lifetimes", "Traits", "Macros"].iter().enumerate() {
        calls.push(tool_use(&format!("n{i}"), "create_node", json!({"graph_id": "rust", "label": label})));
    }
    let provider = ScriptedProvider::new(vec![
        reply(StopReason::ToolUse, calls),
        reply(StopReason::EndTurn, vec![ContentPart::text("Five nodes added.")]),
    ]);
    let (state, store) = app_state(provider).await;

    let mut sink = Collect(Vec::new());
    let outcome = state.engine.run(input("Build a Rust graph"), &mut sink).await;
    assert!(outcome.success);

    let reported_ok = sink
        .0
        .iter()
        .filter(|e| matches!(e, TurnEvent::ToolResult { success: true, .. }))
        .count();
    assert_eq!(reported_ok, 6);

    let graph = store.graphs.lock().get("rust").cloned().unwrap();
    let mut labels: Vec<&str> = graph["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["label"].as_str().unwrap())
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["Borrowing", "Lifetimes", "Macros", "Ownership", "Traits"]);

    // Saves on one graph never overlap.
    let hits = store.hits.lock().clone();
    let mut puts: Vec<&Hit> = hits.iter().filter(|h| h.method == Method::PUT).collect();
    puts.sort_by_key(|h| h.started);
    for pair in puts.windows(2) {
        assert!(pair[0].finished <= pair[1].started);
    }
}

#[tokio::test]
async fn synthesized_tools_are_offered_to_the_model() {
    let provider = ScriptedProvider::new(vec![reply(StopReason::EndTurn, vec![ContentPart::text("hi")])]);
    let (state, _store) = app_state(provider.clone()).await;

    let (outcome, log) = state.engine.run_batch(input("hello")).await;
    assert!(outcome.success);
    assert!(log.succeeded());

    let requests = provider.requests.lock();
    let names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"create_graph"));
    assert!(names.contains(&"kg_get_stats"));
    assert!(!names.contains(&"kg_get_graph"));
    assert_eq!(requests[0].native_tools.len(), 1);
}

// ── HTTP API ────────────────────────────────────────────────────────

async fn serve(state: AppState) -> String {
    let app = gw_gateway::api::router().with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn batch_chat_returns_outcome_and_log() {
    let provider = ScriptedProvider::new(build_graph_script());
    let (state, _store) = app_state(provider).await;
    let base = serve(state).await;

    let resp: Value = reqwest::Client::new()
        .post(format!("{base}/v1/chat"))
        .json(&json!({"message": "Build me a graph about Rust", "caller": "tester"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["success"], true);
    assert_eq!(resp["turns"], 2);
    assert_eq!(resp["content"], "Done: graph 'rust' with one node.");
    assert_eq!(resp["usage"]["total_tokens"], 60);

    let kinds: Vec<&str> = resp["log"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.first(), Some(&"thinking"));
    assert_eq!(kinds.last(), Some(&"done"));
    assert_eq!(kinds.iter().filter(|k| **k == "tool_result").count(), 2);
}

#[tokio::test]
async fn chat_without_a_message_is_rejected() {
    let provider = ScriptedProvider::new(Vec::new());
    let (state, _store) = app_state(provider.clone()).await;
    let base = serve(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat"))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("message"));
    assert!(provider.requests.lock().is_empty());
}

#[tokio::test]
async fn unknown_profile_is_rejected() {
    let provider = ScriptedProvider::new(Vec::new());
    let (state, _store) = app_state(provider).await;
    let base = serve(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat"))
        .json(&json!({"message": "hi", "profile": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn streaming_chat_emits_named_events() {
    let provider = ScriptedProvider::new(vec![reply(
        StopReason::EndTurn,
        vec![ContentPart::text("Hello there.")],
    )]);
    let (state, _store) = app_state(provider).await;
    let base = serve(state).await;

    let body = reqwest::Client::new()
        .post(format!("{base}/v1/chat/stream"))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let events: Vec<&str> = body
        .lines()
        .filter_map(|l| l.strip_prefix("event: ").or_else(|| l.strip_prefix("event:")))
        .map(str::trim)
        .collect();
    assert_eq!(events, vec!["thinking", "text", "done"]);
    assert!(body.contains("Hello there."));
}

#[tokio::test]
async fn tools_endpoint_lists_origins() {
    let provider = ScriptedProvider::new(Vec::new());
    let (state, _store) = app_state(provider).await;
    let base = serve(state).await;

    let resp: Value = reqwest::get(format!("{base}/v1/tools")).await.unwrap().json().await.unwrap();
    let tools = resp["tools"].as_array().unwrap();
    let origin_of = |name: &str| {
        tools
            .iter()
            .find(|t| t["name"] == name)
            .map(|t| t["origin"].as_str().unwrap_or_default().to_string())
    };
    assert_eq!(origin_of("create_graph").as_deref(), Some("builtin"));
    assert_eq!(origin_of("kg_get_stats").as_deref(), Some("synthesized"));
    assert_eq!(origin_of("web_search").as_deref(), Some("native"));
    assert_eq!(resp["synthesized"], 1);
}

#[tokio::test]
async fn invoke_endpoint_dispatches_directly() {
    let provider = ScriptedProvider::new(Vec::new());
    let (state, store) = app_state(provider).await;
    let base = serve(state).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}/v1/tools/invoke"))
        .json(&json!({"tool": "create_graph", "input": {"title": "Notes", "graph_id": "notes"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["ok"], true);
    assert_eq!(created["origin"], "builtin");
    assert!(store.graphs.lock().contains_key("notes"));

    let again: Value = client
        .post(format!("{base}/v1/tools/invoke"))
        .json(&json!({"tool": "create_graph", "args": {"title": "Notes", "graph_id": "notes"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["ok"], false);
    assert!(again["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn health_reports_catalog_state() {
    let provider = ScriptedProvider::new(Vec::new());
    let (state, _store) = app_state(provider).await;
    let base = serve(state).await;

    let resp: Value = reqwest::get(format!("{base}/v1/health")).await.unwrap().json().await.unwrap();
    assert_eq!(resp["status"], "ok");
    assert_eq!(resp["provider"], "scripted");
    assert_eq!(resp["synthesized_tools"], 1);
}
