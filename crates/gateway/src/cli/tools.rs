//! `graphweaver tools list`: show the catalog the model would see.

use std::sync::Arc;

use anyhow::Context;

use gw_domain::config::Config;
use gw_tools::{GraphClient, ToolCatalog};

pub async fn list(config: Arc<Config>, json: bool) -> anyhow::Result<()> {
    let graph = Arc::new(GraphClient::new(&config.graph).context("creating graph storage client")?);
    let catalog = ToolCatalog::new(graph, &config.catalog);
    let snapshot = catalog.refresh().await;

    if json {
        let out = serde_json::json!({
            "tools": snapshot.tools,
            "native": snapshot.native,
        });
        let text = serde_json::to_string_pretty(&out).context("serializing catalog")?;
        println!("{text}");
        return Ok(());
    }

    for tool in &snapshot.tools {
        let origin = snapshot
            .origin(&tool.name)
            .map(|o| format!("{o:?}").to_lowercase())
            .unwrap_or_default();
        let summary = tool.description.lines().next().unwrap_or("");
        println!("{:<32} {:<12} {summary}", tool.name, origin);
    }
    for native in &snapshot.native {
        println!("{:<32} {:<12}", native.name(), "native");
    }
    println!(
        "\n{} tool(s), {} synthesized from {}",
        snapshot.tools.len() + snapshot.native.len(),
        snapshot.synthesized_count(),
        config.graph.base_url,
    );
    Ok(())
}
