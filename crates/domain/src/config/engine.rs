use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard bound on model calls per run.
    #[serde(default = "d_12")]
    pub max_turns: u32,
    #[serde(default = "d_4096")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Overrides `llm.default_model` when set.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "d_system_prompt")]
    pub system_prompt: String,
    /// Byte ceiling for one serialized tool result.
    #[serde(default = "d_12000")]
    pub result_max_bytes: usize,
    /// Prefix kept from an oversized text field.
    #[serde(default = "d_500")]
    pub field_prefix_chars: usize,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: d_12(),
            max_tokens: d_4096(),
            temperature: None,
            model: None,
            system_prompt: d_system_prompt(),
            result_max_bytes: d_12000(),
            field_prefix_chars: d_500(),
            suggestions: SuggestionsConfig::default(),
        }
    }
}

/// Follow-up prompt generation after a final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionsConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Cheaper model for the extra call; falls back to the run's model.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "d_300")]
    pub max_tokens: u32,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            max_tokens: d_300(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_12() -> u32 {
    12
}
fn d_4096() -> u32 {
    4096
}
fn d_12000() -> usize {
    12_000
}
fn d_500() -> usize {
    500
}
fn d_300() -> u32 {
    300
}
fn d_true() -> bool {
    true
}
fn d_system_prompt() -> String {
    "You build and maintain knowledge graphs for the user. Use the graph tools to \
     create graphs, nodes and edges. Create a graph before adding nodes to it. \
     Answer concisely once the work is done."
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.max_turns, 12);
        assert_eq!(cfg.result_max_bytes, 12_000);
        assert!(cfg.temperature.is_none());
        assert!(cfg.suggestions.enabled);
    }
}
