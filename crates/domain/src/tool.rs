use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Internal tool call format (provider-agnostic).
/// Every adapter converts provider-specific tool calls to/from this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's input.
    pub parameters: Value,
}

/// Capabilities executed by the model backend itself rather than by us.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NativeTool {
    WebSearch { max_uses: u32 },
}

impl NativeTool {
    pub fn name(&self) -> &'static str {
        match self {
            NativeTool::WebSearch { .. } => "web_search",
        }
    }
}

/// Uniform outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Value),
    Failure(String),
}

impl ToolResult {
    pub fn failure(message: impl Into<String>) -> Self {
        ToolResult::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// The payload that gets serialized back into the conversation.
    pub fn payload(&self) -> Value {
        match self {
            ToolResult::Success(v) => v.clone(),
            ToolResult::Failure(msg) => serde_json::json!({ "error": msg }),
        }
    }
}

impl From<crate::error::Result<Value>> for ToolResult {
    fn from(r: crate::error::Result<Value>) -> Self {
        match r {
            Ok(v) => ToolResult::Success(v),
            Err(e) => ToolResult::Failure(e.to_string()),
        }
    }
}

/// A message in the conversation (provider-agnostic).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    /// Provider-executed block (e.g. a built-in search call and its
    /// results). Carried verbatim so it can be echoed back on the next turn.
    #[serde(rename = "native")]
    Native { block: Value },
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }
    pub fn assistant_parts(parts: Vec<ContentPart>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Parts(parts) }
    }
    /// A user-role message answering tool invocations.
    pub fn tool_results(parts: Vec<ContentPart>) -> Self {
        Self { role: Role::User, content: MessageContent::Parts(parts) }
    }
}

impl MessageContent {
    /// Extract the plain-text content (first text part, or the full text).
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(t) => Some(t.as_str()),
            MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    pub fn parts(&self) -> Vec<ContentPart> {
        match self {
            MessageContent::Text(t) => vec![ContentPart::Text { text: t.clone() }],
            MessageContent::Parts(p) => p.clone(),
        }
    }
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        ContentPart::ToolResult {
            tool_use_id: call_id.into(),
            content: content.into(),
            is_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_part_uses_wire_tags() {
        let part = ContentPart::ToolUse {
            id: "t1".into(),
            name: "get_graph".into(),
            input: json!({"graph_id": "g"}),
        };
        let v = serde_json::to_value(&part).unwrap();
        assert_eq!(v["type"], "tool_use");
        assert_eq!(v["name"], "get_graph");
    }

    #[test]
    fn message_text_accepts_plain_or_parts() {
        let plain: Message = serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(plain.content.text(), Some("hi"));

        let parts: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": [{"type": "tool_use", "id": "a", "name": "x", "input": {}}, {"type": "text", "text": "ok"}]
        }))
        .unwrap();
        assert_eq!(parts.content.text(), Some("ok"));
    }

    #[test]
    fn failure_payload_wraps_message() {
        let r = ToolResult::failure("boom");
        assert!(!r.is_success());
        assert_eq!(r.payload(), json!({"error": "boom"}));
    }

    #[test]
    fn result_conversion_keeps_error_text() {
        let r: ToolResult = Err(crate::error::Error::UnknownTool("nope".into())).into();
        assert_eq!(r, ToolResult::Failure("Unknown tool: 'nope'".into()));
    }
}
