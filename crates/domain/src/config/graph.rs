use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Graph storage service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Bearer token sent with every storage request.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Env var consulted when `api_key` is unset.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
    /// Path of the machine-readable API description.
    #[serde(default = "d_description_path")]
    pub api_description_path: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key: None,
            api_key_env: d_api_key_env(),
            timeout_ms: d_30000(),
            api_description_path: d_description_path(),
        }
    }
}

impl GraphConfig {
    /// Explicit key first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://127.0.0.1:8080".into()
}
fn d_api_key_env() -> String {
    "GW_GRAPH_API_KEY".into()
}
fn d_30000() -> u64 {
    30_000
}
fn d_description_path() -> String {
    "/openapi.json".into()
}
