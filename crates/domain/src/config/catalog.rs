use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool catalog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// How long a synthesized catalog is served before it is rebuilt.
    #[serde(default = "d_300")]
    pub ttl_secs: u64,
    /// Namespace prefix of synthesized tool names.
    #[serde(default = "d_prefix")]
    pub prefix: String,
    /// Extra synthesized names to drop, on top of the built-in blocklist.
    #[serde(default)]
    pub blocklist: Vec<String>,
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl_secs: d_300(),
            prefix: d_prefix(),
            blocklist: Vec::new(),
            web_search: WebSearchConfig::default(),
        }
    }
}

/// The provider-native search capability offered alongside our tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_5")]
    pub max_uses: u32,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_uses: 5,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_300() -> u64 {
    300
}
fn d_prefix() -> String {
    "kg_".into()
}
fn d_true() -> bool {
    true
}
fn d_5() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg: CatalogConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.ttl_secs, 300);
        assert_eq!(cfg.prefix, "kg_");
        assert!(cfg.web_search.enabled);
        assert_eq!(cfg.web_search.max_uses, 5);
    }

    #[test]
    fn web_search_can_be_disabled() {
        let cfg: CatalogConfig = toml::from_str(
            r#"
            blocklist = ["kg_delete_graph"]
            [web_search]
            enabled = false
        "#,
        )
        .unwrap();
        assert!(!cfg.web_search.enabled);
        assert_eq!(cfg.blocklist, vec!["kg_delete_graph".to_string()]);
    }
}
