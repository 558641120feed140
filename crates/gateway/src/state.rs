use std::sync::Arc;
use std::time::Instant;

use gw_domain::config::{resolve_profile, Config, ResolvedProfile};
use gw_domain::error::Result;
use gw_providers::LlmProvider;
use gw_tools::{GraphClient, ToolCatalog, ToolDispatcher};

use crate::runtime::TurnEngine;

/// Shared application state passed to all API handlers.
///
/// Everything here is immutable or internally synchronised; the only
/// process-wide mutable state is the tool catalog's snapshot pointer.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub provider: Arc<dyn LlmProvider>,
    pub graph: Arc<GraphClient>,

    // ── Tools ─────────────────────────────────────────────────────────
    pub catalog: Arc<ToolCatalog>,
    pub dispatcher: Arc<ToolDispatcher>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub engine: Arc<TurnEngine>,
    pub started_at: Instant,
}

impl AppState {
    /// Run parameters for `profile`, or the engine defaults.
    pub fn profile(&self, profile: Option<&str>) -> Result<ResolvedProfile> {
        match profile {
            Some(name) => resolve_profile(&self.config.profiles, name, &self.config.engine),
            None => Ok(ResolvedProfile::from_engine(&self.config.engine)),
        }
    }
}
