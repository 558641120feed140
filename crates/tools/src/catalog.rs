//! Process-wide tool catalog.
//!
//! A snapshot is the union of the hand-authored tools, the tools
//! synthesized from the storage service's API description, and the
//! provider-native search capability. Snapshots are immutable; a refresh
//! builds a new one and swaps the pointer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use gw_domain::config::CatalogConfig;
use gw_domain::error::Result;
use gw_domain::tool::{NativeTool, ToolDefinition};

use crate::builtin::{self, BuiltinTool};
use crate::graph::GraphClient;
use crate::schema::{self, OperationMapping, SynthesizedTools};

/// Upper bound on how long a fallback snapshot is served after a failed
/// description fetch before the next attempt.
pub const FAILURE_RETRY: Duration = Duration::from_secs(30);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Description source
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the API description comes from.
#[async_trait::async_trait]
pub trait DescriptionSource: Send + Sync {
    async fn fetch_description(&self) -> Result<Value>;
}

#[async_trait::async_trait]
impl DescriptionSource for GraphClient {
    async fn fetch_description(&self) -> Result<Value> {
        GraphClient::fetch_description(self).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOrigin {
    Builtin,
    Synthesized,
    Native,
}

/// Immutable view of the tool set offered to the model.
#[derive(Debug)]
pub struct CatalogSnapshot {
    /// Hand-authored tools first, then synthesized ones.
    pub tools: Vec<ToolDefinition>,
    pub native: Vec<NativeTool>,
    pub mappings: BTreeMap<String, OperationMapping>,
    pub built_at: Instant,
    /// Served without a rebuild while younger than this.
    pub fresh_for: Duration,
}

impl CatalogSnapshot {
    fn new(synth: SynthesizedTools, native: Vec<NativeTool>, fresh_for: Duration) -> Self {
        let mut tools = builtin::definitions();
        tools.extend(synth.definitions);
        Self {
            tools,
            native,
            mappings: synth.mappings,
            built_at: Instant::now(),
            fresh_for,
        }
    }

    /// Same tool set, restamped.
    fn renewed(&self, fresh_for: Duration) -> Self {
        Self {
            tools: self.tools.clone(),
            native: self.native.clone(),
            mappings: self.mappings.clone(),
            built_at: Instant::now(),
            fresh_for,
        }
    }

    pub fn mapping(&self, name: &str) -> Option<&OperationMapping> {
        self.mappings.get(name)
    }

    pub fn origin(&self, name: &str) -> Option<ToolOrigin> {
        if BuiltinTool::from_name(name).is_some() {
            Some(ToolOrigin::Builtin)
        } else if self.mappings.contains_key(name) {
            Some(ToolOrigin::Synthesized)
        } else if self.native.iter().any(|n| n.name() == name) {
            Some(ToolOrigin::Native)
        } else {
            None
        }
    }

    pub fn synthesized_count(&self) -> usize {
        self.mappings.len()
    }

    pub fn age(&self) -> Duration {
        self.built_at.elapsed()
    }

    pub fn is_fresh(&self) -> bool {
        self.age() < self.fresh_for
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Catalog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ToolCatalog {
    source: Arc<dyn DescriptionSource>,
    ttl: Duration,
    prefix: String,
    blocklist: Vec<String>,
    native: Vec<NativeTool>,
    current: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl ToolCatalog {
    pub fn new(source: Arc<dyn DescriptionSource>, cfg: &CatalogConfig) -> Self {
        let mut blocklist: Vec<String> = cfg.blocklist.clone();
        // A synthesized tool may never shadow a hand-authored one.
        blocklist.extend(BuiltinTool::ALL.iter().map(|t| t.name().to_string()));

        let native = if cfg.web_search.enabled {
            vec![NativeTool::WebSearch { max_uses: cfg.web_search.max_uses }]
        } else {
            Vec::new()
        };

        Self {
            source,
            ttl: Duration::from_secs(cfg.ttl_secs),
            prefix: cfg.prefix.clone(),
            blocklist,
            native,
            current: RwLock::new(None),
        }
    }

    /// Namespace prefix of synthesized tool names.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The cached snapshot, whatever its age.
    pub fn cached(&self) -> Option<Arc<CatalogSnapshot>> {
        self.current.read().clone()
    }

    /// Current snapshot, rebuilding it first when it has gone stale.
    ///
    /// Never fails: if the description cannot be fetched the previous tool
    /// set (or the hand-authored tools only) is cached for up to
    /// [`FAILURE_RETRY`] and returned.
    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        if let Some(snap) = self.cached() {
            if snap.is_fresh() {
                return snap;
            }
        }
        self.refresh().await
    }

    /// Rebuild from a freshly fetched description regardless of age.
    pub async fn refresh(&self) -> Arc<CatalogSnapshot> {
        match self.source.fetch_description().await {
            Ok(doc) => {
                let synth = schema::synthesize(&doc, &self.prefix, &self.blocklist);
                let snap = Arc::new(CatalogSnapshot::new(synth, self.native.clone(), self.ttl));
                tracing::info!(
                    synthesized = snap.synthesized_count(),
                    total = snap.tools.len(),
                    "tool catalog rebuilt"
                );
                *self.current.write() = Some(snap.clone());
                snap
            }
            Err(e) => {
                let retry_in = self.ttl.min(FAILURE_RETRY);
                tracing::warn!(
                    error = %e,
                    retry_in_secs = retry_in.as_secs(),
                    "API description fetch failed; serving previous tool catalog"
                );
                let fallback = match self.cached() {
                    Some(prev) => prev.renewed(retry_in),
                    None => CatalogSnapshot::new(SynthesizedTools::default(), self.native.clone(), retry_in),
                };
                let snap = Arc::new(fallback);
                *self.current.write() = Some(snap.clone());
                snap
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_domain::error::Error;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        calls: AtomicUsize,
        fail_from: usize,
    }

    #[async_trait::async_trait]
    impl DescriptionSource for Scripted {
        async fn fetch_description(&self) -> Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_from {
                return Err(Error::Http("connection refused".into()));
            }
            Ok(json!({
                "paths": {
                    "/api/stats": { "get": { "operationId": "getStats" } },
                    "/api/graphs/{graph_id}": { "get": { "operationId": "getGraph" } }
                }
            }))
        }
    }

    fn catalog(ttl_secs: u64, fail_from: usize) -> (Arc<Scripted>, ToolCatalog) {
        let src = Arc::new(Scripted { calls: AtomicUsize::new(0), fail_from });
        let cfg = CatalogConfig { ttl_secs, ..Default::default() };
        (src.clone(), ToolCatalog::new(src, &cfg))
    }

    #[tokio::test]
    async fn cache_hit_skips_fetch() {
        let (src, cat) = catalog(300, usize::MAX);
        let a = cat.snapshot().await;
        let b = cat.snapshot().await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.origin("kg_get_stats"), Some(ToolOrigin::Synthesized));
        assert_eq!(a.origin("create_graph"), Some(ToolOrigin::Builtin));
        assert_eq!(a.origin("web_search"), Some(ToolOrigin::Native));
        // Blocklisted by default.
        assert_eq!(a.origin("kg_get_graph"), None);
    }

    #[tokio::test]
    async fn expired_snapshot_is_replaced_atomically() {
        let (src, cat) = catalog(0, usize::MAX);
        let a = cat.snapshot().await;
        let b = cat.snapshot().await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(&a, &b));
        // The earlier snapshot is untouched.
        assert_eq!(a.tools, b.tools);
    }

    #[tokio::test]
    async fn fetch_failure_serves_previous_snapshot() {
        let (_src, cat) = catalog(0, 1);
        let first = cat.snapshot().await;
        assert_eq!(first.synthesized_count(), 1);
        let second = cat.snapshot().await;
        assert_eq!(second.tools, first.tools);
        assert_eq!(second.synthesized_count(), 1);
        assert!(second.mapping("kg_get_stats").is_some());
    }

    #[tokio::test]
    async fn fetch_failure_without_cache_offers_builtins() {
        let (_src, cat) = catalog(300, 0);
        let snap = cat.snapshot().await;
        assert_eq!(snap.synthesized_count(), 0);
        assert_eq!(snap.tools.len(), BuiltinTool::ALL.len());
        assert!(cat.cached().is_some());
    }

    #[tokio::test]
    async fn failed_fetch_is_not_repeated_while_fallback_is_fresh() {
        let (src, cat) = catalog(300, 0);
        let first = cat.snapshot().await;
        for _ in 0..9 {
            let again = cat.snapshot().await;
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.fresh_for, FAILURE_RETRY);
    }

    #[tokio::test]
    async fn fallback_after_success_keeps_tools_and_backs_off() {
        let (src, cat) = catalog(300, 1);
        let first = cat.snapshot().await;
        // Forced rebuild fails; the previous tools are restamped.
        let fallback = cat.refresh().await;
        assert_eq!(fallback.tools, first.tools);
        assert_eq!(fallback.fresh_for, FAILURE_RETRY);
        let again = cat.snapshot().await;
        assert!(Arc::ptr_eq(&fallback, &again));
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn short_ttl_bounds_the_failure_backoff() {
        let (src, cat) = catalog(0, 0);
        let snap = cat.snapshot().await;
        assert_eq!(snap.fresh_for, Duration::ZERO);
        cat.snapshot().await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn web_search_can_be_disabled() {
        let src = Arc::new(Scripted { calls: AtomicUsize::new(0), fail_from: usize::MAX });
        let mut cfg = CatalogConfig::default();
        cfg.web_search.enabled = false;
        let cat = ToolCatalog::new(src, &cfg);
        assert!(cat.snapshot().await.native.is_empty());
    }
}
