use serde_json::{Map, Value};

/// Deepest level at which objects are still merged key by key.
pub const MAX_MERGE_DEPTH: usize = 8;

/// Structural merge of `overlay` onto `base`.
///
/// Objects merge key by key. Arrays and scalars from the overlay replace the
/// base value wholesale. Once `max_depth` levels have been descended, the
/// overlay value replaces the base value even when both are objects.
pub fn deep_merge(base: &Value, overlay: &Value, max_depth: usize) -> Value {
    match (base, overlay) {
        (Value::Object(b), Value::Object(o)) if max_depth > 0 => {
            Value::Object(merge_maps(b, o, max_depth))
        }
        (_, o) => o.clone(),
    }
}

fn merge_maps(base: &Map<String, Value>, overlay: &Map<String, Value>, depth: usize) -> Map<String, Value> {
    let mut out = base.clone();
    for (k, ov) in overlay {
        let merged = match out.get(k) {
            Some(bv) => deep_merge(bv, ov, depth - 1),
            None => ov.clone(),
        };
        out.insert(k.clone(), merged);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_objects_merge() {
        let base = json!({"tone": {"formal": true, "lang": "en"}, "limit": 3});
        let overlay = json!({"tone": {"lang": "fr"}});
        let out = deep_merge(&base, &overlay, MAX_MERGE_DEPTH);
        assert_eq!(out, json!({"tone": {"formal": true, "lang": "fr"}, "limit": 3}));
    }

    #[test]
    fn arrays_are_replaced() {
        let base = json!({"tags": ["a", "b"]});
        let overlay = json!({"tags": ["c"]});
        assert_eq!(deep_merge(&base, &overlay, MAX_MERGE_DEPTH), json!({"tags": ["c"]}));
    }

    #[test]
    fn depth_limit_replaces_subtree() {
        let base = json!({"a": {"b": {"keep": 1}}});
        let overlay = json!({"a": {"b": {"new": 2}}});
        // depth 1: only the top level merges, "a" is replaced wholesale.
        assert_eq!(deep_merge(&base, &overlay, 1), json!({"a": {"b": {"new": 2}}}));
        assert_eq!(
            deep_merge(&base, &overlay, 3),
            json!({"a": {"b": {"keep": 1, "new": 2}}})
        );
    }

    #[test]
    fn scalar_overlay_wins() {
        assert_eq!(deep_merge(&json!({"x": 1}), &json!(5), 4), json!(5));
        assert_eq!(deep_merge(&json!(null), &json!({"x": 1}), 4), json!({"x": 1}));
    }
}
