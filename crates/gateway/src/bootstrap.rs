//! AppState construction shared by `serve`, `run` and `tools list` so they
//! can boot the runtime with or without an HTTP listener.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use gw_domain::config::{Config, ConfigSeverity};
use gw_providers::LlmProvider;
use gw_tools::{GraphClient, GraphTools, TemplateStore, ToolCatalog, ToolDispatcher, Truncator};

use crate::runtime::TurnEngine;
use crate::state::AppState;

/// Validate config, build the model provider and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    validate_config(&config)?;

    let provider = gw_providers::from_config(&config.llm).context("initializing LLM provider")?;
    tracing::info!(
        provider = provider.provider_id(),
        model = provider.default_model(),
        "LLM provider ready"
    );

    assemble(config, provider).await
}

/// Wire every subsystem around an already-built provider and warm the
/// tool catalog.
pub async fn assemble(config: Arc<Config>, provider: Arc<dyn LlmProvider>) -> anyhow::Result<AppState> {
    // ── Storage client ───────────────────────────────────────────────
    let graph = Arc::new(GraphClient::new(&config.graph).context("creating graph storage client")?);
    tracing::info!(url = %graph.base_url(), "graph storage client ready");

    // ── Templates ────────────────────────────────────────────────────
    let templates = Arc::new(TemplateStore::load(&config.templates).context("loading HTML templates")?);
    tracing::info!(templates = ?templates.names(), "templates loaded");

    // ── Tool catalog + dispatcher ────────────────────────────────────
    let catalog = Arc::new(ToolCatalog::new(graph.clone(), &config.catalog));
    let dispatcher = Arc::new(ToolDispatcher::new(
        graph.clone(),
        GraphTools::new(graph.clone(), templates),
        config.catalog.prefix.clone(),
    ));

    // Warm the catalog so the first run does not pay for synthesis.
    let snapshot = catalog.snapshot().await;
    tracing::info!(
        tools = snapshot.tools.len(),
        synthesized = snapshot.synthesized_count(),
        ttl_secs = config.catalog.ttl_secs,
        "tool catalog ready"
    );

    // ── Turn engine ──────────────────────────────────────────────────
    let engine = Arc::new(TurnEngine::new(
        provider.clone(),
        catalog.clone(),
        dispatcher.clone(),
        Truncator::new(config.engine.result_max_bytes, config.engine.field_prefix_chars),
        config.engine.suggestions.clone(),
    ));

    Ok(AppState {
        config,
        provider,
        graph,
        catalog,
        dispatcher,
        engine,
        started_at: Instant::now(),
    })
}

fn validate_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}
