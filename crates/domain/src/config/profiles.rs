use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::merge::{deep_merge, MAX_MERGE_DEPTH};

use super::EngineConfig;

/// Longest `extends` chain followed before giving up.
const MAX_EXTENDS_CHAIN: usize = 16;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent profiles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named set of run parameters. Unset fields inherit from the profile
/// named in `extends`, and finally from `[engine]`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileConfig {
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Free-form behavioural contract handed to the model.
    #[serde(default)]
    pub contract: Map<String, Value>,
}

/// Run parameters after the inheritance chain has been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedProfile {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_turns: u32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub contract: Value,
}

impl ResolvedProfile {
    /// Engine defaults with no profile applied.
    pub fn from_engine(engine: &EngineConfig) -> Self {
        Self {
            model: engine.model.clone(),
            temperature: engine.temperature,
            max_turns: engine.max_turns,
            max_tokens: engine.max_tokens,
            system_prompt: engine.system_prompt.clone(),
            contract: Value::Object(Map::new()),
        }
    }

    /// System instructions with the contract appended, if any.
    pub fn system_instructions(&self) -> String {
        match &self.contract {
            Value::Object(m) if !m.is_empty() => format!(
                "{}\n\nFollow this contract:\n{}",
                self.system_prompt,
                serde_json::to_string_pretty(&self.contract).unwrap_or_default()
            ),
            _ => self.system_prompt.clone(),
        }
    }
}

/// Resolve `name` through its `extends` chain on top of the engine defaults.
pub fn resolve_profile(
    profiles: &HashMap<String, ProfileConfig>,
    name: &str,
    engine: &EngineConfig,
) -> Result<ResolvedProfile> {
    // Collect root-first.
    let mut chain: Vec<&ProfileConfig> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    let mut current = Some(name);
    while let Some(n) = current {
        if seen.contains(&n) {
            return Err(Error::Config(format!(
                "profile inheritance cycle: {} -> {n}",
                seen.join(" -> ")
            )));
        }
        if seen.len() >= MAX_EXTENDS_CHAIN {
            return Err(Error::Config(format!(
                "profile '{name}' extends chain exceeds {MAX_EXTENDS_CHAIN} levels"
            )));
        }
        let profile = profiles
            .get(n)
            .ok_or_else(|| Error::Config(format!("unknown profile '{n}'")))?;
        seen.push(n);
        chain.push(profile);
        current = profile.extends.as_deref();
    }
    chain.reverse();

    let mut out = ResolvedProfile::from_engine(engine);
    for p in chain {
        if p.model.is_some() {
            out.model = p.model.clone();
        }
        if p.temperature.is_some() {
            out.temperature = p.temperature;
        }
        if let Some(t) = p.max_turns {
            out.max_turns = t;
        }
        if let Some(t) = p.max_tokens {
            out.max_tokens = t;
        }
        if let Some(s) = &p.system_prompt {
            out.system_prompt = s.clone();
        }
        out.contract = deep_merge(&out.contract, &Value::Object(p.contract.clone()), MAX_MERGE_DEPTH);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profiles(toml_str: &str) -> HashMap<String, ProfileConfig> {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn child_overrides_parent_and_merges_contract() {
        let p = profiles(
            r#"
            [base]
            model = "m-base"
            max_turns = 4
            contract = { style = { tone = "neutral", bullets = true }, tags = ["a", "b"] }

            [child]
            extends = "base"
            temperature = 0.2
            contract = { style = { tone = "playful" }, tags = ["c"] }
        "#,
        );
        let r = resolve_profile(&p, "child", &EngineConfig::default()).unwrap();
        assert_eq!(r.model.as_deref(), Some("m-base"));
        assert_eq!(r.max_turns, 4);
        assert_eq!(r.temperature, Some(0.2));
        assert_eq!(
            r.contract,
            json!({"style": {"tone": "playful", "bullets": true}, "tags": ["c"]})
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let p = profiles(
            r#"
            [a]
            extends = "b"
            [b]
            extends = "a"
        "#,
        );
        let err = resolve_profile(&p, "a", &EngineConfig::default()).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn unknown_parent_is_an_error() {
        let p = profiles(
            r#"
            [a]
            extends = "ghost"
        "#,
        );
        assert!(resolve_profile(&p, "a", &EngineConfig::default()).is_err());
    }

    #[test]
    fn empty_contract_leaves_prompt_alone() {
        let r = ResolvedProfile::from_engine(&EngineConfig::default());
        assert_eq!(r.system_instructions(), r.system_prompt);
    }

    #[test]
    fn contract_is_appended_to_instructions() {
        let p = profiles(
            r#"
            [terse]
            system_prompt = "Be brief."
            contract = { max_words = 50 }
        "#,
        );
        let r = resolve_profile(&p, "terse", &EngineConfig::default()).unwrap();
        let s = r.system_instructions();
        assert!(s.starts_with("Be brief."));
        assert!(s.contains("\"max_words\": 50"));
    }
}
