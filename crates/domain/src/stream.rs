use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted while a run progresses (provider-agnostic).
///
/// The streaming transport forwards each one as a server-sent event named
/// after the variant; the batch transport records them in an execution log.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A model call started.
    Thinking { turn: u32 },

    /// A tool invocation is about to execute.
    ToolCall { id: String, tool: String, input: Value },

    /// Progress note from a multi-step tool.
    ToolProgress { tool: String, message: String },

    /// A tool invocation finished.
    ToolResult {
        id: String,
        tool: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Assistant text.
    Text { content: String },

    /// Follow-up prompts offered after the final answer.
    Suggestions { suggestions: Vec<String> },

    /// Fatal run error. `stop_reason` is set when the model stopped for a
    /// reason the engine does not handle.
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },

    /// The run finished.
    Done {
        turns: u32,
        #[serde(rename = "maxReached", skip_serializing_if = "is_false")]
        max_reached: bool,
    },
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl TurnEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::Thinking { .. } => "thinking",
            TurnEvent::ToolCall { .. } => "tool_call",
            TurnEvent::ToolProgress { .. } => "tool_progress",
            TurnEvent::ToolResult { .. } => "tool_result",
            TurnEvent::Text { .. } => "text",
            TurnEvent::Suggestions { .. } => "suggestions",
            TurnEvent::Error { .. } => "error",
            TurnEvent::Done { .. } => "done",
        }
    }

    /// Event payload without the `type` discriminator.
    pub fn payload(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = v.as_object_mut() {
            obj.remove("type");
        }
        v
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Error { .. } | TurnEvent::Done { .. })
    }
}

/// Token usage for a completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn done_hides_max_reached_when_false() {
        let ev = TurnEvent::Done { turns: 1, max_reached: false };
        assert_eq!(ev.payload(), json!({"turns": 1}));

        let ev = TurnEvent::Done { turns: 8, max_reached: true };
        assert_eq!(ev.payload(), json!({"turns": 8, "maxReached": true}));
    }

    #[test]
    fn tool_result_payload_shape() {
        let ev = TurnEvent::ToolResult {
            id: "c1".into(),
            tool: "get_graph".into(),
            success: false,
            summary: None,
            error: Some("not found".into()),
        };
        assert_eq!(ev.name(), "tool_result");
        let p = ev.payload();
        assert_eq!(p["success"], false);
        assert_eq!(p["error"], "not found");
        assert!(p.get("summary").is_none());
        assert!(p.get("type").is_none());
    }
}
