//! Tool schema synthesis from a live API description.
//!
//! Walks the `paths` table of an OpenAPI-style document and produces one
//! [`ToolDefinition`] per operation plus the [`OperationMapping`] needed to
//! replay a tool call as an HTTP request. Query, path and body fields are
//! flattened into a single input object.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use gw_domain::tool::ToolDefinition;

/// Synthesized names that hand-authored tools already cover.
pub const DEFAULT_BLOCKLIST: &[&str] = &[
    "kg_get_graph",
    "kg_save_graph",
    "kg_list_graphs",
    "kg_create_graph",
];

/// Methods considered, in the order they are visited per path.
const METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

/// Nesting bound for `$ref` inlining.
const MAX_REF_DEPTH: usize = 12;

/// Input property that carries a non-object request body.
pub const RAW_BODY_FIELD: &str = "body";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// HTTP recipe backing one synthesized tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationMapping {
    /// Upper-case HTTP verb.
    pub method: String,
    /// Path template with `{param}` placeholders.
    pub path: String,
    pub path_params: Vec<String>,
    pub query_params: Vec<String>,
    pub body_fields: Vec<String>,
    pub has_body: bool,
    /// The body schema is not an object; the whole body travels in the
    /// [`RAW_BODY_FIELD`] input property.
    pub raw_body: bool,
}

impl OperationMapping {
    pub fn is_body_verb(&self) -> bool {
        matches!(self.method.as_str(), "POST" | "PUT" | "PATCH")
    }
}

/// Output of one synthesis pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesizedTools {
    pub definitions: Vec<ToolDefinition>,
    pub mappings: BTreeMap<String, OperationMapping>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Synthesis
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build tool definitions for every operation in `doc`.
///
/// Deterministic for a given document: paths are visited in sorted order
/// and methods in [`METHODS`] order. When two operations normalise to the
/// same name the first one wins. Names in `blocklist` are dropped.
pub fn synthesize(doc: &Value, prefix: &str, blocklist: &[String]) -> SynthesizedTools {
    let mut out = SynthesizedTools::default();

    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return out;
    };

    let mut sorted: Vec<(&String, &Value)> = paths.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    for (path, item) in sorted {
        let Some(item) = item.as_object() else { continue };
        let shared_params = item.get("parameters").and_then(Value::as_array);

        for method in METHODS {
            let Some(op) = item.get(*method).and_then(Value::as_object) else {
                continue;
            };

            let name = match op.get("operationId").and_then(Value::as_str) {
                Some(id) if !id.trim().is_empty() => tool_name(prefix, id),
                _ => fallback_name(prefix, method, path),
            };

            if blocklist.iter().any(|b| b == &name) || DEFAULT_BLOCKLIST.contains(&name.as_str()) {
                tracing::debug!(tool = %name, "synthesized tool blocklisted");
                continue;
            }
            if out.mappings.contains_key(&name) {
                tracing::debug!(tool = %name, path = %path, "duplicate synthesized tool name; keeping first");
                continue;
            }

            let (definition, mapping) = build_operation(doc, &name, method, path, op, shared_params);
            out.definitions.push(definition);
            out.mappings.insert(name, mapping);
        }
    }

    out
}

fn build_operation(
    doc: &Value,
    name: &str,
    method: &str,
    path: &str,
    op: &Map<String, Value>,
    shared_params: Option<&Vec<Value>>,
) -> (ToolDefinition, OperationMapping) {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();
    let mut mapping = OperationMapping {
        method: method.to_uppercase(),
        path: path.to_string(),
        path_params: Vec::new(),
        query_params: Vec::new(),
        body_fields: Vec::new(),
        has_body: false,
        raw_body: false,
    };

    // Operation-level parameters override path-level ones of the same name.
    let mut params: Vec<Value> = Vec::new();
    let op_params = op.get("parameters").and_then(Value::as_array);
    for p in op_params.into_iter().flatten().chain(shared_params.into_iter().flatten()) {
        let p = deref(doc, p);
        let pname = p.get("name").and_then(Value::as_str);
        let already = params
            .iter()
            .any(|q| q.get("name").and_then(Value::as_str) == pname);
        if pname.is_some() && !already {
            params.push(p);
        }
    }

    for p in &params {
        let Some(pname) = p.get("name").and_then(Value::as_str) else { continue };
        let location = p.get("in").and_then(Value::as_str).unwrap_or("query");
        let is_required = location == "path" || p.get("required").and_then(Value::as_bool).unwrap_or(false);

        match location {
            "path" => mapping.path_params.push(pname.to_string()),
            "query" => mapping.query_params.push(pname.to_string()),
            // Header and cookie parameters are the client's business.
            _ => continue,
        }

        let mut schema = match p.get("schema") {
            Some(s) => resolve_schema(doc, s, 0, &mut Vec::new()),
            None => json!({"type": "string"}),
        };
        if let (Some(desc), Some(obj)) = (p.get("description").and_then(Value::as_str), schema.as_object_mut()) {
            obj.entry("description").or_insert_with(|| Value::String(desc.to_string()));
        }
        properties.insert(pname.to_string(), schema);
        if is_required {
            required.push(pname.to_string());
        }
    }

    if let Some(body_schema) = op
        .get("requestBody")
        .map(|rb| deref(doc, rb))
        .and_then(|rb| rb.pointer("/content/application~1json/schema").cloned())
    {
        mapping.has_body = true;
        let body_required = op
            .get("requestBody")
            .map(|rb| deref(doc, rb))
            .and_then(|rb| rb.get("required").and_then(Value::as_bool))
            .unwrap_or(false);
        let resolved = resolve_schema(doc, &body_schema, 0, &mut Vec::new());

        match resolved.get("properties").and_then(Value::as_object) {
            Some(body_props) => {
                let body_req: Vec<&str> = resolved
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                for (field, schema) in body_props {
                    // Parameters claim the name first.
                    if properties.contains_key(field) {
                        continue;
                    }
                    properties.insert(field.clone(), schema.clone());
                    mapping.body_fields.push(field.clone());
                    if body_req.contains(&field.as_str()) {
                        required.push(field.clone());
                    }
                }
            }
            None => {
                mapping.raw_body = true;
                mapping.body_fields.push(RAW_BODY_FIELD.to_string());
                properties.insert(RAW_BODY_FIELD.to_string(), resolved);
                if body_required {
                    required.push(RAW_BODY_FIELD.to_string());
                }
            }
        }
    }

    let mut parameters = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        parameters["required"] = json!(required);
    }

    let definition = ToolDefinition {
        name: name.to_string(),
        description: describe(op, &mapping),
        parameters,
    };
    (definition, mapping)
}

fn describe(op: &Map<String, Value>, mapping: &OperationMapping) -> String {
    let text = op
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| op.get("description").and_then(Value::as_str))
        .unwrap_or("")
        .trim();
    if text.is_empty() {
        format!("{} {}", mapping.method, mapping.path)
    } else {
        format!("{text} ({} {})", mapping.method, mapping.path)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Naming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `getKnowGraph` → `kg_get_know_graph`.
pub fn tool_name(prefix: &str, operation_id: &str) -> String {
    format!("{prefix}{}", snake_case(operation_id))
}

/// Name for an operation without an id: method plus literal path segments.
fn fallback_name(prefix: &str, method: &str, path: &str) -> String {
    let literal: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .collect();
    tool_name(prefix, &format!("{method}_{}", literal.join("_")))
}

fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && i > 0 {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
                if prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next_lower)
                {
                    out.push('_');
                }
            }
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let collapsed: Vec<&str> = out.split('_').filter(|p| !p.is_empty()).collect();
    collapsed.join("_")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schema resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn empty_object() -> Value {
    json!({"type": "object"})
}

/// Follow a top-level `$ref` once (used for parameters and request bodies).
fn deref(doc: &Value, v: &Value) -> Value {
    match v.get("$ref").and_then(Value::as_str) {
        Some(r) => lookup(doc, r).cloned().unwrap_or_else(empty_object),
        None => v.clone(),
    }
}

fn lookup<'a>(doc: &'a Value, reference: &str) -> Option<&'a Value> {
    reference.strip_prefix('#').and_then(|ptr| doc.pointer(ptr))
}

/// Inline references and reduce a schema to the subset the model needs.
///
/// `visiting` holds the references on the current descent so cycles
/// degrade to an empty object instead of recursing forever.
pub fn resolve_schema(doc: &Value, schema: &Value, depth: usize, visiting: &mut Vec<String>) -> Value {
    if depth > MAX_REF_DEPTH {
        return empty_object();
    }

    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        if visiting.iter().any(|r| r == reference) {
            return empty_object();
        }
        let Some(target) = lookup(doc, reference) else {
            tracing::debug!(reference = %reference, "unresolvable schema reference");
            return empty_object();
        };
        visiting.push(reference.to_string());
        let mut resolved = resolve_schema(doc, target, depth + 1, visiting);
        visiting.pop();
        // Sibling description on the referencing node wins.
        if let (Some(desc), Some(obj)) = (schema.get("description"), resolved.as_object_mut()) {
            obj.insert("description".into(), desc.clone());
        }
        return resolved;
    }

    if let Some(parts) = schema.get("allOf").and_then(Value::as_array) {
        return merge_all_of(doc, parts, depth, visiting);
    }

    let declared = schema.get("type").and_then(Value::as_str);
    let mut out = Map::new();

    match declared {
        Some("array") => {
            out.insert("type".into(), json!("array"));
            let items = schema
                .get("items")
                .map(|i| resolve_schema(doc, i, depth + 1, visiting))
                .unwrap_or_else(|| json!({}));
            out.insert("items".into(), items);
        }
        Some("object") | None if schema.get("properties").is_some() || declared.is_some() => {
            out.insert("type".into(), json!("object"));
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                let mut resolved = Map::new();
                for (k, v) in props {
                    resolved.insert(k.clone(), resolve_schema(doc, v, depth + 1, visiting));
                }
                out.insert("properties".into(), Value::Object(resolved));
            }
            if let Some(req) = schema.get("required").filter(|r| r.as_array().is_some_and(|a| !a.is_empty())) {
                out.insert("required".into(), req.clone());
            }
        }
        Some(primitive) => {
            out.insert("type".into(), json!(primitive));
            for key in ["enum", "default", "format"] {
                if let Some(v) = schema.get(key) {
                    out.insert(key.into(), v.clone());
                }
            }
        }
        None => {
            // Untyped and property-less: keep enum/default if present.
            for key in ["enum", "default"] {
                if let Some(v) = schema.get(key) {
                    out.insert(key.into(), v.clone());
                }
            }
            if out.is_empty() {
                return empty_object();
            }
        }
    }

    if let Some(desc) = schema.get("description") {
        out.insert("description".into(), desc.clone());
    }
    Value::Object(out)
}

fn merge_all_of(doc: &Value, parts: &[Value], depth: usize, visiting: &mut Vec<String>) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();
    for part in parts {
        let resolved = resolve_schema(doc, part, depth + 1, visiting);
        if let Some(props) = resolved.get("properties").and_then(Value::as_object) {
            for (k, v) in props {
                properties.insert(k.clone(), v.clone());
            }
        }
        if let Some(req) = resolved.get("required").and_then(Value::as_array) {
            for r in req {
                if !required.contains(r) {
                    required.push(r.clone());
                }
            }
        }
    }
    let mut out = json!({"type": "object", "properties": properties});
    if !required.is_empty() {
        out["required"] = Value::Array(required);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> Value {
        json!({
            "openapi": "3.0.0",
            "paths": {
                "/api/graphs/{graph_id}": {
                    "parameters": [{"name": "graph_id", "in": "path", "required": true, "schema": {"type": "string"}}],
                    "get": {"operationId": "getGraph", "summary": "Fetch a graph"},
                    "put": {
                        "operationId": "saveGraph",
                        "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Graph"}}}}
                    }
                },
                "/api/graphs/{graph_id}/search": {
                    "get": {
                        "operationId": "searchKnowGraph",
                        "summary": "Full-text search inside a graph",
                        "parameters": [
                            {"name": "graph_id", "in": "path", "required": true, "schema": {"type": "string"}},
                            {"name": "q", "in": "query", "required": true, "schema": {"type": "string"}, "description": "search text"},
                            {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 10}},
                            {"name": "X-Trace", "in": "header", "schema": {"type": "string"}}
                        ]
                    }
                },
                "/api/graphs/{graph_id}/nodes/bulk": {
                    "post": {
                        "operationId": "bulkCreateNodes",
                        "parameters": [{"$ref": "#/components/parameters/GraphId"}],
                        "requestBody": {
                            "required": true,
                            "content": {"application/json": {"schema": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}}}}
                        }
                    }
                },
                "/api/stats": {
                    "get": {"summary": "Storage statistics"}
                },
                "/api/tags": {
                    "post": {
                        "operationId": "createTag",
                        "parameters": [{"name": "dry_run", "in": "query", "schema": {"type": "boolean"}}],
                        "requestBody": {"content": {"application/json": {"schema": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {
                                "name": {"type": "string"},
                                "color": {"type": "string", "enum": ["red", "blue"]},
                                "parent": {"$ref": "#/components/schemas/Missing"}
                            }
                        }}}}
                    }
                }
            },
            "components": {
                "parameters": {
                    "GraphId": {"name": "graph_id", "in": "path", "required": true, "schema": {"type": "string"}}
                },
                "schemas": {
                    "Graph": {"type": "object", "properties": {"title": {"type": "string"}, "nodes": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}}}},
                    "Node": {
                        "type": "object",
                        "required": ["label"],
                        "properties": {
                            "label": {"type": "string"},
                            "children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}}
                        }
                    }
                }
            }
        })
    }

    fn names(t: &SynthesizedTools) -> Vec<&str> {
        t.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn operation_ids_become_prefixed_snake_case() {
        assert_eq!(tool_name("kg_", "getKnowGraph"), "kg_get_know_graph");
        assert_eq!(tool_name("kg_", "getHTMLNode"), "kg_get_html_node");
        assert_eq!(tool_name("kg_", "list-graphs v2"), "kg_list_graphs_v2");
        assert_eq!(tool_name("kg_", "node2Edge"), "kg_node2_edge");
    }

    #[test]
    fn missing_operation_id_uses_method_and_path() {
        assert_eq!(fallback_name("kg_", "get", "/api/stats"), "kg_get_api_stats");
        assert_eq!(fallback_name("kg_", "delete", "/api/graphs/{id}"), "kg_delete_api_graphs");
    }

    #[test]
    fn default_blocklist_removes_covered_operations() {
        let tools = synthesize(&sample_doc(), "kg_", &[]);
        let n = names(&tools);
        assert!(!n.contains(&"kg_get_graph"));
        assert!(!n.contains(&"kg_save_graph"));
        assert_eq!(
            n,
            vec![
                "kg_bulk_create_nodes",
                "kg_search_know_graph",
                "kg_get_api_stats",
                "kg_create_tag",
            ]
        );
    }

    #[test]
    fn extra_blocklist_applies_after_normalization() {
        let tools = synthesize(&sample_doc(), "kg_", &["kg_create_tag".to_string()]);
        assert!(!names(&tools).contains(&"kg_create_tag"));
        for d in &tools.definitions {
            assert!(!DEFAULT_BLOCKLIST.contains(&d.name.as_str()));
        }
    }

    #[test]
    fn synthesis_is_deterministic() {
        let doc = sample_doc();
        assert_eq!(synthesize(&doc, "kg_", &[]), synthesize(&doc, "kg_", &[]));
    }

    #[test]
    fn query_and_path_parameters_are_flattened() {
        let tools = synthesize(&sample_doc(), "kg_", &[]);
        let def = tools.definitions.iter().find(|d| d.name == "kg_search_know_graph").unwrap();
        let props = def.parameters["properties"].as_object().unwrap();
        assert!(props.contains_key("graph_id"));
        assert!(props.contains_key("q"));
        assert!(!props.contains_key("X-Trace"));
        assert_eq!(props["q"]["description"], "search text");
        assert_eq!(props["limit"]["default"], 10);
        assert_eq!(def.parameters["required"], json!(["graph_id", "q"]));

        let m = &tools.mappings["kg_search_know_graph"];
        assert_eq!(m.method, "GET");
        assert_eq!(m.path_params, vec!["graph_id"]);
        assert_eq!(m.query_params, vec!["q", "limit"]);
        assert!(!m.has_body);
    }

    #[test]
    fn body_fields_join_the_property_bag() {
        let tools = synthesize(&sample_doc(), "kg_", &[]);
        let def = tools.definitions.iter().find(|d| d.name == "kg_create_tag").unwrap();
        let props = &def.parameters["properties"];
        assert_eq!(props["color"]["enum"], json!(["red", "blue"]));
        // Unresolvable reference degrades to an empty object schema.
        assert_eq!(props["parent"], json!({"type": "object"}));
        assert_eq!(def.parameters["required"], json!(["name"]));

        let m = &tools.mappings["kg_create_tag"];
        assert!(m.has_body && !m.raw_body);
        assert_eq!(m.query_params, vec!["dry_run"]);
        assert_eq!(m.body_fields, vec!["color", "name", "parent"]);
    }

    #[test]
    fn array_bodies_travel_in_raw_body_field() {
        let tools = synthesize(&sample_doc(), "kg_", &[]);
        let m = &tools.mappings["kg_bulk_create_nodes"];
        assert!(m.raw_body);
        assert_eq!(m.path_params, vec!["graph_id"]);
        let def = tools.definitions.iter().find(|d| d.name == "kg_bulk_create_nodes").unwrap();
        let body = &def.parameters["properties"][RAW_BODY_FIELD];
        assert_eq!(body["type"], "array");
        assert_eq!(body["items"]["properties"]["label"]["type"], "string");
        assert_eq!(def.parameters["required"], json!(["graph_id", "body"]));
    }

    #[test]
    fn recursive_references_terminate() {
        let doc = sample_doc();
        let node = resolve_schema(&doc, &json!({"$ref": "#/components/schemas/Node"}), 0, &mut Vec::new());
        // Second level of the cycle collapses to an empty object.
        assert_eq!(node["properties"]["children"]["items"], json!({"type": "object"}));
    }

    #[test]
    fn description_falls_back_to_route() {
        let tools = synthesize(&sample_doc(), "kg_", &[]);
        let def = tools.definitions.iter().find(|d| d.name == "kg_create_tag").unwrap();
        assert_eq!(def.description, "POST /api/tags");
        let stats = tools.definitions.iter().find(|d| d.name == "kg_get_api_stats").unwrap();
        assert_eq!(stats.description, "Storage statistics (GET /api/stats)");
    }

    #[test]
    fn documents_without_paths_yield_nothing() {
        assert!(synthesize(&json!({"openapi": "3.0.0"}), "kg_", &[]).definitions.is_empty());
        assert!(synthesize(&json!([]), "kg_", &[]).mappings.is_empty());
    }
}
