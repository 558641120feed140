//! Size bounding for tool results re-entering the conversation.
//!
//! Oversized payloads are first shrunk structurally: in every list of
//! records, each record's largest text field is cut to a prefix and marked.
//! Prefix lengths step down until the payload fits. If nothing fits, the
//! serialized text is cut at the ceiling and marked as lossy.

use serde_json::Value;

/// Appended to a shortened text field.
pub const FIELD_MARKER: &str = " [truncated]";

/// Appended when the serialized payload itself had to be cut.
pub const HARD_MARKER: &str = "\n[truncated — result too large]";

/// Prefix lengths tried in order, after the configured one.
const PREFIX_LADDER: &[usize] = &[200, 100, 50, 20];

/// How deep to look for lists of records.
const MAX_SEARCH_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct Truncator {
    pub max_bytes: usize,
    pub field_prefix_chars: usize,
}

impl Default for Truncator {
    fn default() -> Self {
        Self {
            max_bytes: 12_000,
            field_prefix_chars: 500,
        }
    }
}

impl Truncator {
    pub fn new(max_bytes: usize, field_prefix_chars: usize) -> Self {
        Self { max_bytes, field_prefix_chars }
    }

    /// Text form of a tool payload, bounded to `max_bytes`.
    pub fn render(&self, value: &Value) -> String {
        let full = render_plain(value);
        if full.len() <= self.max_bytes {
            return full;
        }

        if has_record_lists(value, 0) {
            let mut prefixes = vec![self.field_prefix_chars];
            prefixes.extend(PREFIX_LADDER.iter().copied().filter(|p| *p < self.field_prefix_chars));

            for prefix in prefixes {
                let mut shrunk = value.clone();
                shrink_records(&mut shrunk, prefix, 0);
                let text = render_plain(&shrunk);
                if text.len() <= self.max_bytes {
                    tracing::debug!(
                        original_bytes = full.len(),
                        bytes = text.len(),
                        prefix,
                        "tool result shrunk structurally"
                    );
                    return text;
                }
            }
        }

        tracing::debug!(original_bytes = full.len(), "tool result hard-truncated");
        hard_truncate(&full, self.max_bytes)
    }
}

fn render_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_record_list(v: &Value) -> bool {
    v.as_array()
        .is_some_and(|a| !a.is_empty() && a.iter().any(Value::is_object))
}

fn has_record_lists(v: &Value, depth: usize) -> bool {
    if is_record_list(v) {
        return true;
    }
    if depth >= MAX_SEARCH_DEPTH {
        return false;
    }
    match v {
        Value::Object(m) => m.values().any(|c| has_record_lists(c, depth + 1)),
        _ => false,
    }
}

fn shrink_records(v: &mut Value, prefix: usize, depth: usize) {
    if is_record_list(v) {
        if let Some(items) = v.as_array_mut() {
            for item in items.iter_mut() {
                shrink_largest_text(item, prefix);
            }
        }
        return;
    }
    if depth >= MAX_SEARCH_DEPTH {
        return;
    }
    if let Value::Object(m) = v {
        for child in m.values_mut() {
            shrink_records(child, prefix, depth + 1);
        }
    }
}

/// Shorten the record's longest string field, if shortening saves space.
fn shrink_largest_text(record: &mut Value, prefix: usize) {
    let Some(obj) = record.as_object_mut() else { return };
    let Some(key) = obj
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.len())))
        .max_by_key(|(_, len)| *len)
        .map(|(k, _)| k.clone())
    else {
        return;
    };

    if let Some(Value::String(s)) = obj.get_mut(&key) {
        if s.chars().count() > prefix + FIELD_MARKER.chars().count() {
            let cut: String = s.chars().take(prefix).collect();
            *s = format!("{cut}{FIELD_MARKER}");
        }
    }
}

/// Cut `text` to at most `max_bytes`, marker included. A ceiling too small
/// to hold the marker gets a bare cut.
fn hard_truncate(text: &str, max_bytes: usize) -> String {
    if max_bytes < HARD_MARKER.len() {
        return text[..floor_char_boundary(text, max_bytes)].to_string();
    }
    let end = floor_char_boundary(text, max_bytes - HARD_MARKER.len());
    format!("{}{HARD_MARKER}", &text[..end])
}

fn floor_char_boundary(text: &str, at: usize) -> usize {
    let mut end = at.min(text.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn big_graph(nodes: usize, text_len: usize) -> Value {
        let nodes: Vec<Value> = (0..nodes)
            .map(|i| {
                json!({
                    "id": format!("n{i}"),
                    "label": format!("Node {i}"),
                    "content": "x".repeat(text_len),
                })
            })
            .collect();
        json!({ "id": "g1", "title": "Big", "nodes": nodes, "edges": [] })
    }

    #[test]
    fn small_results_pass_through() {
        let t = Truncator::default();
        let v = json!({"ok": true, "nodes": [{"id": "a"}]});
        assert_eq!(t.render(&v), v.to_string());
    }

    #[test]
    fn strings_render_without_quotes() {
        let t = Truncator::default();
        assert_eq!(t.render(&json!("plain text")), "plain text");
    }

    #[test]
    fn hundred_large_nodes_fit_under_ceiling() {
        let t = Truncator::default();
        let v = big_graph(100, 2048);
        assert!(v.to_string().len() > 4 * 12_000);

        let out = t.render(&v);
        assert!(out.len() <= 12_000, "got {} bytes", out.len());

        let parsed: Value = serde_json::from_str(&out).expect("shrunk output stays valid JSON");
        let nodes = parsed["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 100);
        for n in nodes {
            assert!(n["content"].as_str().unwrap().ends_with(FIELD_MARKER));
            assert!(n["id"].as_str().unwrap().starts_with('n'));
        }
    }

    #[test]
    fn nested_record_lists_are_found() {
        let t = Truncator::new(4_000, 500);
        let v = json!({ "graph": big_graph(10, 1000) });
        let out = t.render(&v);
        assert!(out.len() <= 4_000);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert!(parsed["graph"]["nodes"][0]["content"].as_str().unwrap().ends_with(FIELD_MARKER));
    }

    #[test]
    fn top_level_record_array_is_shrunk() {
        let t = Truncator::new(2_000, 100);
        let v: Value = (0..10).map(|i| json!({"id": i, "body": "y".repeat(500)})).collect();
        let out = t.render(&v);
        assert!(out.len() <= 2_000);
        assert!(serde_json::from_str::<Value>(&out).is_ok());
    }

    #[test]
    fn shapeless_payload_is_hard_truncated() {
        let t = Truncator::new(1_000, 500);
        let v = json!({"blob": "z".repeat(5_000)});
        let out = t.render(&v);
        assert!(out.len() <= 1_000);
        assert!(out.ends_with(HARD_MARKER));
    }

    #[test]
    fn too_many_records_falls_back_to_hard_truncation() {
        let t = Truncator::new(3_000, 500);
        let out = t.render(&big_graph(200, 300));
        assert!(out.len() <= 3_000);
        assert!(out.ends_with(HARD_MARKER));
    }

    #[test]
    fn oversized_payloads_never_grow() {
        let t = Truncator::new(100, 10);
        for v in [
            json!({"nodes": [{"a": "short"}], "pad": "p".repeat(200)}),
            json!("é".repeat(300)),
            json!({"nodes": [{"body": "b".repeat(150)}]}),
            json!((0..60).collect::<Vec<u32>>()),
        ] {
            let full = render_plain(&v);
            assert!(full.len() > t.max_bytes);
            let out = t.render(&v);
            assert!(out.len() <= full.len(), "{} > {}", out.len(), full.len());
            assert!(out.len() <= t.max_bytes);
        }
    }

    #[test]
    fn ceiling_below_marker_length_is_still_respected() {
        let tiny = HARD_MARKER.len() - 5;
        let t = Truncator::new(tiny, 10);
        let out = t.render(&json!("w".repeat(500)));
        assert!(out.len() <= tiny, "got {} bytes", out.len());
        assert_eq!(hard_truncate(&"é".repeat(10), 3), "é");
        assert_eq!(hard_truncate("abc", 0), "");
    }

    #[test]
    fn hard_marker_text() {
        assert_eq!(HARD_MARKER, "\n[truncated — result too large]");
    }

    #[test]
    fn hard_truncation_respects_char_boundaries() {
        let out = hard_truncate(&"é".repeat(100), 51);
        assert!(out.ends_with(HARD_MARKER));
        assert!(out.len() <= 51);
    }
}
