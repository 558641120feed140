pub mod anthropic;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use anthropic::AnthropicProvider;
pub use traits::{ChatRequest, ChatResponse, LlmProvider};

use std::sync::Arc;

use gw_domain::config::{LlmConfig, ProviderKind};
use gw_domain::error::Result;

/// Build the configured model backend.
pub fn from_config(cfg: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match cfg.kind {
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::from_config(cfg)?)),
    }
}
