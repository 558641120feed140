//! Tool dispatch.
//!
//! Routing order: the hand-authored table, then synthesized tools (by name
//! prefix, through their operation mapping), then "unknown tool".

use std::sync::Arc;
use std::time::Instant;

use reqwest::Method;
use serde_json::{Map, Value};

use gw_domain::error::{Error, Result};
use gw_domain::tool::ToolResult;

use crate::builtin::{BuiltinTool, GraphTools};
use crate::catalog::CatalogSnapshot;
use crate::context::ToolContext;
use crate::graph::GraphClient;
use crate::schema::{OperationMapping, RAW_BODY_FIELD};

/// Input fields that describe the caller rather than the operation.
/// They are never forwarded to the storage service.
pub const INTERNAL_FIELDS: &[&str] = &["caller", "caller_id", "callerId", "user_id", "userId"];

/// A fully resolved HTTP request for a synthesized tool.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Turn a tool input into the request its operation mapping describes.
pub fn build_http_call(mapping: &OperationMapping, input: &Value) -> Result<HttpCall> {
    let empty = Map::new();
    let fields = input.as_object().unwrap_or(&empty);

    let mut path = mapping.path.clone();
    for p in &mapping.path_params {
        let value = fields
            .get(p)
            .and_then(coerce)
            .ok_or_else(|| Error::InvalidInput(format!("missing required path parameter '{p}'")))?;
        path = path.replace(&format!("{{{p}}}"), &urlencoding::encode(&value));
    }

    let query: Vec<(String, String)> = mapping
        .query_params
        .iter()
        .filter_map(|q| fields.get(q).and_then(coerce).map(|v| (q.clone(), v)))
        .collect();

    let body = if mapping.has_body && mapping.is_body_verb() {
        if mapping.raw_body {
            fields.get(RAW_BODY_FIELD).cloned()
        } else {
            let remaining: Map<String, Value> = fields
                .iter()
                .filter(|(k, _)| {
                    !mapping.path_params.contains(k)
                        && !mapping.query_params.contains(k)
                        && !INTERNAL_FIELDS.contains(&k.as_str())
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Some(Value::Object(remaining))
        }
    } else {
        None
    };

    Ok(HttpCall {
        method: mapping.method.clone(),
        path,
        query,
        body,
    })
}

/// Query and path values travel as strings.
fn coerce(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(coerce)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(v.to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stateless router from tool name to executor.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    client: Arc<GraphClient>,
    builtins: GraphTools,
    prefix: String,
}

impl ToolDispatcher {
    pub fn new(client: Arc<GraphClient>, builtins: GraphTools, prefix: impl Into<String>) -> Self {
        Self {
            client,
            builtins,
            prefix: prefix.into(),
        }
    }

    /// Execute one tool call. Every failure is folded into the result.
    pub async fn execute(
        &self,
        name: &str,
        input: &Value,
        ctx: &ToolContext,
        catalog: &CatalogSnapshot,
    ) -> ToolResult {
        let start = Instant::now();
        let result: Result<Value> = if let Some(tool) = BuiltinTool::from_name(name) {
            self.builtins.run(tool, input, ctx).await
        } else if name.starts_with(&self.prefix) {
            match catalog.mapping(name) {
                Some(mapping) => self.execute_mapped(mapping, input, ctx).await,
                None => Err(Error::UnknownTool(name.to_string())),
            }
        } else {
            Err(Error::UnknownTool(name.to_string()))
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::debug!(tool = %name, duration_ms, "tool succeeded"),
            Err(e) => tracing::warn!(tool = %name, duration_ms, error = %e, "tool failed"),
        }
        result.into()
    }

    async fn execute_mapped(
        &self,
        mapping: &OperationMapping,
        input: &Value,
        ctx: &ToolContext,
    ) -> Result<Value> {
        let call = build_http_call(mapping, input)?;
        let method = Method::from_bytes(call.method.as_bytes())
            .map_err(|_| Error::Other(format!("unsupported HTTP method '{}'", call.method)))?;
        self.client
            .send(method, &call.path, &call.query, call.body.as_ref(), ctx.caller())
            .await
    }
}
