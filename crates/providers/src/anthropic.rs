//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API including tool use and the
//! server-side web search tool. System instructions go in the separate
//! top-level `system` field; tool results travel as user messages.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use gw_domain::config::LlmConfig;
use gw_domain::error::{Error, Result};
use gw_domain::stream::Usage;
use gw_domain::tool::{ContentPart, Message, MessageContent, NativeTool, Role, ToolDefinition};
use gw_domain::turn::StopReason;
use serde_json::{json, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";
const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";
const DEFAULT_MAX_TOKENS: u32 = 4096;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new provider from the `[llm]` config section.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "anthropic".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.default_model.clone(),
            client,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(&self, req: &ChatRequest) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let api_messages: Vec<Value> = req.messages.iter().map(msg_to_anthropic).collect();

        let mut body = json!({
            "model": model,
            "messages": api_messages,
            "max_tokens": req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if let Some(system) = req.system.as_deref().filter(|s| !s.is_empty()) {
            body["system"] = Value::String(system.to_string());
        }

        let mut tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
        tools.extend(req.native_tools.iter().map(native_tool_to_anthropic));
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        if let Some(temp) = req.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_anthropic(msg: &Message) -> Value {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    match &msg.content {
        MessageContent::Text(t) => json!({ "role": role, "content": t }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts.iter().map(part_to_anthropic).collect();
            json!({ "role": role, "content": content })
        }
    }
}

fn part_to_anthropic(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({ "type": "text", "text": text }),
        ContentPart::ToolUse { id, name, input } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentPart::ToolResult { tool_use_id, content, is_error } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error,
        }),
        ContentPart::Native { block } => block.clone(),
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

fn native_tool_to_anthropic(tool: &NativeTool) -> Value {
    match tool {
        NativeTool::WebSearch { max_uses } => json!({
            "type": WEB_SEARCH_TOOL_TYPE,
            "name": tool.name(),
            "max_uses": max_uses,
        }),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_anthropic_response(body: &Value) -> Result<ChatResponse> {
    let blocks = body
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Provider {
            provider: "anthropic".into(),
            message: "response has no content array".into(),
        })?;

    let content = blocks.iter().map(parse_block).collect();

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let stop_reason = StopReason::parse(body.get("stop_reason").and_then(|v| v.as_str()));
    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(ChatResponse {
        content,
        stop_reason,
        usage,
        model,
    })
}

fn parse_block(block: &Value) -> ContentPart {
    let str_field = |k: &str| block.get(k).and_then(|v| v.as_str()).unwrap_or("").to_string();
    match block.get("type").and_then(|v| v.as_str()) {
        Some("text") => ContentPart::Text { text: str_field("text") },
        Some("tool_use") => ContentPart::ToolUse {
            id: str_field("id"),
            name: str_field("name"),
            input: block
                .get("input")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
        },
        // Server tool calls, search results, citations and anything newer.
        _ => ContentPart::Native { block: block.clone() },
    }
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(&req);

        tracing::debug!(
            provider = %self.id,
            url = %url,
            messages = req.messages.len(),
            tools = req.tools.len(),
            "anthropic chat request"
        );

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_anthropic_response(&resp_json)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
