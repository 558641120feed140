//! Hand-authored graph tools.
//!
//! Each tool normalises its input once through a typed struct (serde
//! aliases absorb the alternative spellings models tend to use) and then
//! talks to the storage service. Mutations are fetch-modify-save cycles;
//! the storage service gives no atomicity across them, so every cycle
//! holds the graph's write lock from fetch to save.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use gw_domain::error::{Error, Result};
use gw_domain::tool::ToolDefinition;

use crate::context::ToolContext;
use crate::graph::GraphClient;
use crate::graph_lock::GraphLockMap;
use crate::template::TemplateStore;

/// Ordering partition for tool calls within one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Creates a top-level resource other calls may depend on.
    One,
    Two,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTool {
    CreateGraph,
    GetGraph,
    ListGraphs,
    CreateNode,
    UpdateNode,
    CreateEdge,
    CreateHtmlNode,
}

impl BuiltinTool {
    pub const ALL: [BuiltinTool; 7] = [
        BuiltinTool::CreateGraph,
        BuiltinTool::GetGraph,
        BuiltinTool::ListGraphs,
        BuiltinTool::CreateNode,
        BuiltinTool::UpdateNode,
        BuiltinTool::CreateEdge,
        BuiltinTool::CreateHtmlNode,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinTool::CreateGraph => "create_graph",
            BuiltinTool::GetGraph => "get_graph",
            BuiltinTool::ListGraphs => "list_graphs",
            BuiltinTool::CreateNode => "create_node",
            BuiltinTool::UpdateNode => "update_node",
            BuiltinTool::CreateEdge => "create_edge",
            BuiltinTool::CreateHtmlNode => "create_html_node",
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            BuiltinTool::CreateGraph => Phase::One,
            _ => Phase::Two,
        }
    }

    pub fn definition(self) -> ToolDefinition {
        let (description, parameters) = match self {
            BuiltinTool::CreateGraph => (
                "Create a new, empty knowledge graph. Fails if a graph with the same id exists. \
                 Call this before adding nodes to a new graph.",
                json!({
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Human-readable graph title" },
                        "graph_id": { "type": "string", "description": "Optional id; derived from the title when omitted" },
                        "description": { "type": "string" }
                    },
                    "required": ["title"]
                }),
            ),
            BuiltinTool::GetGraph => (
                "Fetch a graph with all of its nodes and edges.",
                json!({
                    "type": "object",
                    "properties": { "graph_id": { "type": "string" } },
                    "required": ["graph_id"]
                }),
            ),
            BuiltinTool::ListGraphs => (
                "List stored graphs, optionally filtered by title.",
                json!({
                    "type": "object",
                    "properties": { "title": { "type": "string", "description": "Substring filter on graph titles" } }
                }),
            ),
            BuiltinTool::CreateNode => (
                "Add a node to an existing graph.",
                json!({
                    "type": "object",
                    "properties": {
                        "graph_id": { "type": "string" },
                        "label": { "type": "string", "description": "Short node title" },
                        "node_id": { "type": "string", "description": "Optional id; derived from the label when omitted" },
                        "node_type": { "type": "string", "description": "e.g. concept, person, event" },
                        "content": { "type": "string", "description": "Free-text body of the node" },
                        "color": { "type": "string" },
                        "x": { "type": "number" },
                        "y": { "type": "number" }
                    },
                    "required": ["graph_id", "label"]
                }),
            ),
            BuiltinTool::UpdateNode => (
                "Change fields of an existing node. Only supplied fields are modified.",
                json!({
                    "type": "object",
                    "properties": {
                        "graph_id": { "type": "string" },
                        "node_id": { "type": "string" },
                        "label": { "type": "string" },
                        "node_type": { "type": "string" },
                        "content": { "type": "string" },
                        "color": { "type": "string" },
                        "x": { "type": "number" },
                        "y": { "type": "number" }
                    },
                    "required": ["graph_id", "node_id"]
                }),
            ),
            BuiltinTool::CreateEdge => (
                "Connect two existing nodes of a graph.",
                json!({
                    "type": "object",
                    "properties": {
                        "graph_id": { "type": "string" },
                        "source": { "type": "string", "description": "Source node id" },
                        "target": { "type": "string", "description": "Target node id" },
                        "label": { "type": "string", "description": "Relationship name" }
                    },
                    "required": ["graph_id", "source", "target"]
                }),
            ),
            BuiltinTool::CreateHtmlNode => (
                "Render a named HTML template with the given values and store the result as an html node.",
                json!({
                    "type": "object",
                    "properties": {
                        "graph_id": { "type": "string" },
                        "template": { "type": "string", "description": "Template name" },
                        "label": { "type": "string" },
                        "values": { "type": "object", "description": "Placeholder values" },
                        "node_id": { "type": "string" }
                    },
                    "required": ["graph_id", "template", "label"]
                }),
            ),
        };
        ToolDefinition {
            name: self.name().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Definitions for every hand-authored tool.
pub fn definitions() -> Vec<ToolDefinition> {
    BuiltinTool::ALL.into_iter().map(BuiltinTool::definition).collect()
}

/// Phase of any tool by name; only hand-authored tools can be phase one.
pub fn phase_of(name: &str) -> Phase {
    BuiltinTool::from_name(name).map_or(Phase::Two, BuiltinTool::phase)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct CreateGraphInput {
    #[serde(alias = "name")]
    title: String,
    #[serde(default, alias = "graphId", alias = "id")]
    graph_id: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphRef {
    #[serde(alias = "graphId", alias = "id")]
    graph_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListGraphsInput {
    #[serde(default, alias = "query", alias = "name")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeFields {
    #[serde(default, alias = "title", alias = "name")]
    label: Option<String>,
    #[serde(default, alias = "type", alias = "nodeType")]
    node_type: Option<String>,
    #[serde(default, alias = "text", alias = "info", alias = "description")]
    content: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CreateNodeInput {
    #[serde(alias = "graphId")]
    graph_id: String,
    #[serde(default, alias = "nodeId", alias = "id")]
    node_id: Option<String>,
    #[serde(flatten)]
    fields: NodeFields,
}

#[derive(Debug, Deserialize)]
struct UpdateNodeInput {
    #[serde(alias = "graphId")]
    graph_id: String,
    #[serde(alias = "nodeId", alias = "id")]
    node_id: String,
    #[serde(flatten)]
    fields: NodeFields,
}

#[derive(Debug, Deserialize)]
struct CreateEdgeInput {
    #[serde(alias = "graphId")]
    graph_id: String,
    #[serde(alias = "from", alias = "sourceId", alias = "source_id")]
    source: String,
    #[serde(alias = "to", alias = "targetId", alias = "target_id")]
    target: String,
    #[serde(default, alias = "relation", alias = "type")]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateHtmlNodeInput {
    #[serde(alias = "graphId")]
    graph_id: String,
    #[serde(alias = "templateName", alias = "template_name")]
    template: String,
    #[serde(alias = "title")]
    label: String,
    #[serde(default, alias = "data", alias = "fields")]
    values: Map<String, Value>,
    #[serde(default, alias = "nodeId")]
    node_id: Option<String>,
}

fn parse<T: DeserializeOwned>(tool: BuiltinTool, input: &Value) -> Result<T> {
    // Models sometimes send `null` for tools without required fields.
    let input = if input.is_null() { json!({}) } else { input.clone() };
    serde_json::from_value(input)
        .map_err(|e| Error::InvalidInput(format!("invalid {} arguments: {e}", tool.name())))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct GraphTools {
    client: Arc<GraphClient>,
    templates: Arc<TemplateStore>,
    /// Shared by every clone so concurrent calls see the same locks.
    locks: Arc<GraphLockMap>,
}

impl GraphTools {
    pub fn new(client: Arc<GraphClient>, templates: Arc<TemplateStore>) -> Self {
        Self { client, templates, locks: Arc::new(GraphLockMap::new()) }
    }

    pub async fn run(&self, tool: BuiltinTool, input: &Value, ctx: &ToolContext) -> Result<Value> {
        match tool {
            BuiltinTool::CreateGraph => self.create_graph(parse(tool, input)?, ctx).await,
            BuiltinTool::GetGraph => {
                let r: GraphRef = parse(tool, input)?;
                self.client.get(&graph_path(&r.graph_id), ctx.caller()).await
            }
            BuiltinTool::ListGraphs => {
                let r: ListGraphsInput = parse(tool, input)?;
                let query: Vec<(String, String)> =
                    r.title.into_iter().map(|t| ("title".to_string(), t)).collect();
                self.client
                    .send(reqwest::Method::GET, "/api/graphs", &query, None, ctx.caller())
                    .await
            }
            BuiltinTool::CreateNode => self.create_node(parse(tool, input)?, ctx).await,
            BuiltinTool::UpdateNode => self.update_node(parse(tool, input)?, ctx).await,
            BuiltinTool::CreateEdge => self.create_edge(parse(tool, input)?, ctx).await,
            BuiltinTool::CreateHtmlNode => self.create_html_node(parse(tool, input)?, ctx).await,
        }
    }

    /// Check-then-create. The storage service has no conditional create, so
    /// a concurrent creator can still win between the two calls.
    async fn create_graph(&self, input: CreateGraphInput, ctx: &ToolContext) -> Result<Value> {
        let tool = BuiltinTool::CreateGraph.name();
        let graph_id = match input.graph_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => id,
            None => slugify(&input.title, "graph"),
        };
        let path = graph_path(&graph_id);
        let _write = self.locks.acquire(&graph_id).await?;

        ctx.progress(tool, format!("checking whether '{graph_id}' exists"));
        match self.client.get(&path, ctx.caller()).await {
            Ok(_) => {
                return Err(Error::InvalidInput(format!("graph '{graph_id}' already exists")));
            }
            Err(e) if e.status() == Some(404) => {}
            Err(e) => return Err(e),
        }

        let doc = json!({
            "id": graph_id,
            "title": input.title,
            "description": input.description.unwrap_or_default(),
            "nodes": [],
            "edges": [],
        });
        ctx.progress(tool, format!("creating '{graph_id}'"));
        self.client.put(&path, &doc, ctx.caller()).await?;

        Ok(json!({ "graph_id": graph_id, "title": doc["title"], "created": true }))
    }

    async fn create_node(&self, input: CreateNodeInput, ctx: &ToolContext) -> Result<Value> {
        let label = input
            .fields
            .label
            .clone()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("create_node requires a label".into()))?;

        self.modify_graph(BuiltinTool::CreateNode, &input.graph_id, ctx, |doc| {
            let nodes = list_mut(doc, "nodes")?;
            let node_id = match input.node_id.filter(|s| !s.trim().is_empty()) {
                Some(id) if find_by_id(nodes, &id).is_some() => {
                    return Err(Error::InvalidInput(format!("node '{id}' already exists")));
                }
                Some(id) => id,
                None => unique_id(nodes, &slugify(&label, "node")),
            };

            let mut node = Map::new();
            node.insert("id".into(), json!(node_id));
            node.insert("type".into(), json!(input.fields.node_type.as_deref().unwrap_or("concept")));
            apply_fields(&mut node, &input.fields);
            nodes.push(Value::Object(node));

            Ok(json!({ "graph_id": input.graph_id, "node_id": node_id, "created": true }))
        })
        .await
    }

    async fn update_node(&self, input: UpdateNodeInput, ctx: &ToolContext) -> Result<Value> {
        let f = &input.fields;
        if f.label.is_none()
            && f.node_type.is_none()
            && f.content.is_none()
            && f.color.is_none()
            && f.x.is_none()
            && f.y.is_none()
        {
            return Err(Error::InvalidInput("update_node: no fields to update".into()));
        }

        self.modify_graph(BuiltinTool::UpdateNode, &input.graph_id, ctx, |doc| {
            let nodes = list_mut(doc, "nodes")?;
            let idx = find_by_id(nodes, &input.node_id).ok_or_else(|| {
                Error::NotFound(format!("node '{}' in graph '{}'", input.node_id, input.graph_id))
            })?;
            let Some(node) = nodes[idx].as_object_mut() else {
                return Err(Error::Other(format!("node '{}' is not an object", input.node_id)));
            };
            apply_fields(node, &input.fields);
            if let Some(t) = &input.fields.node_type {
                node.insert("type".into(), json!(t));
            }
            Ok(json!({ "graph_id": input.graph_id, "node": nodes[idx].clone() }))
        })
        .await
    }

    async fn create_edge(&self, input: CreateEdgeInput, ctx: &ToolContext) -> Result<Value> {
        self.modify_graph(BuiltinTool::CreateEdge, &input.graph_id, ctx, |doc| {
            let nodes = list_mut(doc, "nodes")?;
            for (role, id) in [("source", &input.source), ("target", &input.target)] {
                if find_by_id(nodes, id).is_none() {
                    return Err(Error::InvalidInput(format!("unknown {role} node '{id}'")));
                }
            }

            let edges = list_mut(doc, "edges")?;
            let edge_id = unique_id(edges, &format!("{}-{}", input.source, input.target));
            let mut edge = json!({
                "id": edge_id,
                "source": input.source,
                "target": input.target,
            });
            if let Some(label) = &input.label {
                edge["label"] = json!(label);
            }
            edges.push(edge);

            Ok(json!({ "graph_id": input.graph_id, "edge_id": edge_id, "created": true }))
        })
        .await
    }

    async fn create_html_node(&self, input: CreateHtmlNodeInput, ctx: &ToolContext) -> Result<Value> {
        let tool = BuiltinTool::CreateHtmlNode;
        ctx.progress(tool.name(), format!("rendering template '{}'", input.template));
        let html = self.templates.render(&input.template, &input.values)?;
        let bytes = html.len();

        self.modify_graph(tool, &input.graph_id, ctx, |doc| {
            let nodes = list_mut(doc, "nodes")?;
            let node_id = match input.node_id.filter(|s| !s.trim().is_empty()) {
                Some(id) if find_by_id(nodes, &id).is_some() => {
                    return Err(Error::InvalidInput(format!("node '{id}' already exists")));
                }
                Some(id) => id,
                None => unique_id(nodes, &slugify(&input.label, "page")),
            };
            nodes.push(json!({
                "id": node_id,
                "type": "html",
                "label": input.label,
                "template": input.template,
                "content": html,
            }));
            Ok(json!({ "graph_id": input.graph_id, "node_id": node_id, "bytes": bytes, "created": true }))
        })
        .await
    }

    /// Load the graph, apply `f`, save it back.
    async fn modify_graph<F>(&self, tool: BuiltinTool, graph_id: &str, ctx: &ToolContext, f: F) -> Result<Value>
    where
        F: FnOnce(&mut Value) -> Result<Value>,
    {
        let path = graph_path(graph_id);
        let _write = self.locks.acquire(graph_id).await?;
        ctx.progress(tool.name(), format!("loading graph '{graph_id}'"));
        let mut doc = self.client.get(&path, ctx.caller()).await?;
        let out = f(&mut doc)?;
        ctx.progress(tool.name(), format!("saving graph '{graph_id}'"));
        self.client.put(&path, &doc, ctx.caller()).await?;
        Ok(out)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Graph document helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn graph_path(graph_id: &str) -> String {
    format!("/api/graphs/{}", urlencoding::encode(graph_id))
}

fn list_mut<'a>(doc: &'a mut Value, key: &str) -> Result<&'a mut Vec<Value>> {
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| Error::Other("graph document is not a JSON object".into()))?;
    let entry = obj.entry(key).or_insert_with(|| Value::Array(Vec::new()));
    if entry.is_null() {
        *entry = Value::Array(Vec::new());
    }
    entry
        .as_array_mut()
        .ok_or_else(|| Error::Other(format!("graph field '{key}' is not a list")))
}

fn find_by_id(items: &[Value], id: &str) -> Option<usize> {
    items.iter().position(|v| v.get("id").and_then(Value::as_str) == Some(id))
}

fn unique_id(items: &[Value], base: &str) -> String {
    if find_by_id(items, base).is_none() {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| find_by_id(items, candidate).is_none())
        .unwrap_or_else(|| base.to_string())
}

fn apply_fields(node: &mut Map<String, Value>, f: &NodeFields) {
    if let Some(v) = &f.label {
        node.insert("label".into(), json!(v));
    }
    if let Some(v) = &f.content {
        node.insert("content".into(), json!(v));
    }
    if let Some(v) = &f.color {
        node.insert("color".into(), json!(v));
    }
    if let Some(v) = f.x {
        node.insert("x".into(), json!(v));
    }
    if let Some(v) = f.y {
        node.insert("y".into(), json!(v));
    }
}

fn slugify(s: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let slug = out.trim_matches('-');
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_round_trips_names() {
        for t in BuiltinTool::ALL {
            assert_eq!(BuiltinTool::from_name(t.name()), Some(t));
            assert_eq!(t.definition().name, t.name());
        }
        assert_eq!(BuiltinTool::from_name("kg_get_graph"), None);
    }

    #[test]
    fn only_create_graph_is_phase_one() {
        assert_eq!(phase_of("create_graph"), Phase::One);
        assert_eq!(phase_of("create_node"), Phase::Two);
        assert_eq!(phase_of("kg_search"), Phase::Two);
        assert!(Phase::One < Phase::Two);
    }

    #[test]
    fn aliases_normalise_input() {
        let input: CreateEdgeInput = parse(
            BuiltinTool::CreateEdge,
            &json!({"graphId": "g", "from": "a", "to": "b", "relation": "knows"}),
        )
        .unwrap();
        assert_eq!(input.graph_id, "g");
        assert_eq!(input.source, "a");
        assert_eq!(input.target, "b");
        assert_eq!(input.label.as_deref(), Some("knows"));

        let node: CreateNodeInput = parse(
            BuiltinTool::CreateNode,
            &json!({"graph_id": "g", "title": "Rust", "info": "systems language"}),
        )
        .unwrap();
        assert_eq!(node.fields.label.as_deref(), Some("Rust"));
        assert_eq!(node.fields.content.as_deref(), Some("systems language"));
    }

    #[test]
    fn bad_input_names_the_tool() {
        let err = parse::<GraphRef>(BuiltinTool::GetGraph, &json!({})).unwrap_err();
        assert!(err.to_string().contains("invalid get_graph arguments"));
    }

    #[test]
    fn null_input_is_an_empty_object() {
        let r: ListGraphsInput = parse(BuiltinTool::ListGraphs, &Value::Null).unwrap();
        assert!(r.title.is_none());
    }

    #[test]
    fn ids_are_unique_and_slugged() {
        let nodes = vec![json!({"id": "rust"}), json!({"id": "rust-2"})];
        assert_eq!(unique_id(&nodes, "rust"), "rust-3");
        assert_eq!(unique_id(&nodes, "go"), "go");
        assert_eq!(slugify("Hello, World!", "x"), "hello-world");
        assert_eq!(slugify("!!!", "node"), "node");
    }

    #[test]
    fn graph_path_encodes_ids() {
        assert_eq!(graph_path("my graph/1"), "/api/graphs/my%20graph%2F1");
    }
}
