use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stream::TurnEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stop conditions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why the model backend stopped generating in a turn.
///
/// Anything the engine has no branch for lands in `Other` and ends the
/// run as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    PauseTurn,
    Other(String),
}

impl StopReason {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("end_turn") => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("pause_turn") => StopReason::PauseTurn,
            Some(other) => StopReason::Other(other.to_string()),
            None => StopReason::Other("missing".into()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::ToolUse => "tool_use",
            StopReason::MaxTokens => "max_tokens",
            StopReason::PauseTurn => "pause_turn",
            StopReason::Other(s) => s,
        }
    }
}

impl Serialize for StopReason {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StopReason {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(StopReason::parse(Some(&raw)))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution log (batch runs)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Thinking,
    ToolCall,
    ToolProgress,
    ToolResult,
    Text,
    Suggestions,
    Error,
    UnexpectedStop,
    Done,
}

/// One timestamped record of a loop event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub detail: Value,
}

impl LogEntry {
    pub fn from_event(event: &TurnEvent) -> Self {
        let kind = match event {
            TurnEvent::Thinking { .. } => LogKind::Thinking,
            TurnEvent::ToolCall { .. } => LogKind::ToolCall,
            TurnEvent::ToolProgress { .. } => LogKind::ToolProgress,
            TurnEvent::ToolResult { .. } => LogKind::ToolResult,
            TurnEvent::Text { .. } => LogKind::Text,
            TurnEvent::Suggestions { .. } => LogKind::Suggestions,
            TurnEvent::Error { stop_reason: Some(_), .. } => LogKind::UnexpectedStop,
            TurnEvent::Error { .. } => LogKind::Error,
            TurnEvent::Done { .. } => LogKind::Done,
        };
        Self {
            timestamp: Utc::now(),
            kind,
            detail: event.payload(),
        }
    }
}

/// Append-only audit trail of one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &TurnEvent) {
        self.entries.push(LogEntry::from_event(event));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    /// A run succeeded when its last entry is `done`.
    pub fn succeeded(&self) -> bool {
        matches!(self.entries.last(), Some(e) if e.kind == LogKind::Done)
    }
}
