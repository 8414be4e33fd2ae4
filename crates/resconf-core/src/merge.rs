use serde_json::Value;

use crate::types::Options;

/// Deep merge two values. Overlay wins for non-object values.
/// Objects are merged recursively; arrays are replaced wholesale.
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            Value::Object(merge_options(base_map, overlay_map))
        }
        (_, overlay) => overlay,
    }
}

/// Deep merge two option bags, `overlay` keys overriding `base` keys.
pub fn merge_options(mut base: Options, overlay: Options) -> Options {
    for (key, overlay_val) in overlay {
        let merged_val = match base.remove(&key) {
            Some(base_val) => merge_values(base_val, overlay_val),
            None => overlay_val,
        };
        base.insert(key, merged_val);
    }
    base
}

/// Deep merge where `existing` wins and `contributed` only fills gaps.
pub fn fill_missing(existing: Options, contributed: Options) -> Options {
    merge_options(contributed, existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_merge_disjoint_keys_union() {
        let merged = merge_options(obj(json!({"a": 1})), obj(json!({"b": 2})));
        assert_eq!(Value::Object(merged), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_merge_scalar_overlay_wins() {
        let merged = merge_options(obj(json!({"a": 1})), obj(json!({"a": 2})));
        assert_eq!(Value::Object(merged), json!({"a": 2}));
    }

    #[test]
    fn test_merge_nested_objects_recursively() {
        let base = obj(json!({"route": {"path": "/a", "methods": ["GET"]}}));
        let overlay = obj(json!({"route": {"methods": ["POST"]}}));
        let merged = merge_options(base, overlay);
        assert_eq!(
            Value::Object(merged),
            json!({"route": {"path": "/a", "methods": ["POST"]}})
        );
    }

    #[test]
    fn test_merge_arrays_are_replaced_not_concatenated() {
        let merged = merge_options(
            obj(json!({"permissions": ["read", "write"]})),
            obj(json!({"permissions": ["admin"]})),
        );
        assert_eq!(Value::Object(merged), json!({"permissions": ["admin"]}));
    }

    #[test]
    fn test_merge_object_replaced_by_scalar() {
        let merged = merge_values(json!({"a": {"b": 1}}), json!({"a": null}));
        assert_eq!(merged, json!({"a": null}));
    }

    #[test]
    fn test_fill_missing_keeps_existing() {
        let existing = obj(json!({"template": "b", "nested": {"x": 1}}));
        let contributed = obj(json!({"template": "a", "extra": true, "nested": {"x": 9, "y": 2}}));
        let merged = fill_missing(existing, contributed);
        assert_eq!(
            Value::Object(merged),
            json!({"template": "b", "extra": true, "nested": {"x": 1, "y": 2}})
        );
    }
}
