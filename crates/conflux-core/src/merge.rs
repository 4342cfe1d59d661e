//! Structural merge of configuration trees
//!
//! Trees are folded left-to-right in store declaration order: the last store
//! listed wins conflicts. Maps merge recursively; anything else (arrays
//! included) is replaced wholesale.

use serde_json::Value;

/// Merge `incoming` into `base`
///
/// When both sides hold an object at the same path the objects merge
/// key-by-key, recursing where both values are again objects. In every other
/// pairing the incoming value replaces the existing one; arrays are never
/// concatenated.
pub fn deep_merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, incoming_value) in incoming_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, incoming_value),
                    None => {
                        base_map.insert(key, incoming_value);
                    }
                }
            }
        }
        (base, incoming) => *base = incoming,
    }
}

/// An empty configuration tree
pub fn empty_tree() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Whether a tree is the empty object
pub fn is_empty_tree(tree: &Value) -> bool {
    matches!(tree, Value::Object(map) if map.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_is_order_sensitive() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 3, "z": 4});

        let mut forward = a.clone();
        deep_merge(&mut forward, b.clone());
        assert_eq!(forward, json!({"x": 1, "y": 3, "z": 4}));

        let mut reverse = b;
        deep_merge(&mut reverse, a);
        assert_eq!(reverse, json!({"x": 1, "y": 2, "z": 4}));
    }

    #[test]
    fn test_nested_maps_merge_recursively() {
        let mut merged = json!({"a": {"p": 1, "q": 2}});
        deep_merge(&mut merged, json!({"a": {"q": 3, "r": 4}}));
        assert_eq!(merged, json!({"a": {"p": 1, "q": 3, "r": 4}}));
    }

    #[test]
    fn test_arrays_are_replaced_not_concatenated() {
        let mut merged = json!({"a": [1, 2]});
        deep_merge(&mut merged, json!({"a": [3]}));
        assert_eq!(merged, json!({"a": [3]}));
    }

    #[test]
    fn test_scalar_replaced_by_map_and_back() {
        let mut merged = json!({"a": 1});
        deep_merge(&mut merged, json!({"a": {"b": 2}}));
        assert_eq!(merged, json!({"a": {"b": 2}}));

        deep_merge(&mut merged, json!({"a": "flat"}));
        assert_eq!(merged, json!({"a": "flat"}));
    }

    #[test]
    fn test_empty_tree_contributes_nothing() {
        let mut merged = json!({"a": 1});
        deep_merge(&mut merged, empty_tree());
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn test_merging_identical_tree_is_idempotent() {
        let tree = json!({"a": {"b": [1, 2]}, "c": "x"});
        let mut merged = tree.clone();
        deep_merge(&mut merged, tree.clone());
        assert_eq!(merged, tree);
    }
}
