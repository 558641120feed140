mod catalog;
mod engine;
mod graph;
mod llm;
mod observability;
mod profiles;
mod server;

pub use catalog::*;
pub use engine::*;
pub use graph::*;
pub use llm::*;
pub use observability::*;
pub use profiles::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    /// HTML templates available to `create_html_node` (name -> file).
    #[serde(default)]
    pub templates: HashMap<String, PathBuf>,
    /// Agent profiles (key = profile name).
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: ConfigSeverity::Error, field: field.into(), message: message.into() }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: ConfigSeverity::Warning, field: field.into(), message: message.into() }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    /// Empty when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*" {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        }
        if self.llm.auth.key.is_none() && self.llm.auth.env.is_none() {
            errors.push(ConfigError::warning("llm.auth", "no API key or key env var configured"));
        }

        if !self.graph.base_url.starts_with("http://") && !self.graph.base_url.starts_with("https://") {
            errors.push(ConfigError::error(
                "graph.base_url",
                "base_url must start with http:// or https://",
            ));
        }
        if !self.graph.api_description_path.starts_with('/') {
            errors.push(ConfigError::error(
                "graph.api_description_path",
                "path must start with '/'",
            ));
        }

        if self.catalog.prefix.is_empty() {
            errors.push(ConfigError::error("catalog.prefix", "prefix must not be empty"));
        }
        if self.catalog.ttl_secs == 0 {
            errors.push(ConfigError::warning(
                "catalog.ttl_secs",
                "ttl of 0 rebuilds the catalog on every run",
            ));
        }

        if self.engine.max_turns == 0 {
            errors.push(ConfigError::error("engine.max_turns", "max_turns must be at least 1"));
        }
        if self.engine.result_max_bytes < 1024 {
            errors.push(ConfigError::warning(
                "engine.result_max_bytes",
                "ceilings below 1024 bytes leave little room for tool output",
            ));
        }
        if let Some(t) = self.engine.temperature {
            if !(0.0..=1.0).contains(&t) {
                errors.push(ConfigError::error("engine.temperature", "temperature must be within 0.0..=1.0"));
            }
        }

        for name in self.profiles.keys() {
            if let Err(e) = resolve_profile(&self.profiles, name, &self.engine) {
                errors.push(ConfigError::error(format!("profiles.{name}"), e.to_string()));
            }
        }

        errors
    }
}
