use serde_json::{Map, Value};

/// Collapses every object-valued attribute of `document` into a scalar.
///
/// The replacement is the last leaf (in document order) of the recursively flattened child,
/// rendered as text; strings lose their quotes. An empty child object drops the attribute.
/// Arrays and scalars are left untouched. Owner fields such as
/// `{"recipient": {"AddressOwner": "0x1"}}` become `{"recipient": "0x1"}`.
pub fn flatten(document: Value) -> Value {
    flatten_except(document, &[])
}

/// Like [`flatten`], but attributes named in `keep` are passed through unchanged.
pub fn flatten_except(document: Value, keep: &[&str]) -> Value {
    match document {
        Value::Object(map) => Value::Object(flatten_map(map, keep)),
        other => other,
    }
}

fn flatten_map(map: Map<String, Value>, keep: &[&str]) -> Map<String, Value> {
    let mut flat = Map::with_capacity(map.len());
    for (key, value) in map {
        if keep.contains(&key.as_str()) {
            flat.insert(key, value);
            continue;
        }
        match value {
            Value::Object(child) => {
                let child = flatten_map(child, &[]);
                if let Some((_, leaf)) = child.into_iter().last() {
                    flat.insert(key, Value::String(leaf_text(leaf)));
                }
            }
            other => {
                flat.insert(key, other);
            }
        }
    }
    flat
}

fn leaf_text(leaf: Value) -> String {
    match leaf {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn owner_objects_become_scalars() {
        let flat = flatten(json!({
            "sender": "0xa1",
            "recipient": {"AddressOwner": "0xb2"},
            "owner": {"Shared": {"initial_shared_version": 3}},
            "version": 5
        }));
        assert_eq!(
            flat,
            json!({
                "sender": "0xa1",
                "recipient": "0xb2",
                "owner": "3",
                "version": 5
            })
        );
    }

    #[test]
    fn last_leaf_wins_and_empty_objects_drop() {
        let flat = flatten(json!({
            "a": {"first": "x", "second": {"deep": true}},
            "b": {},
            "c": [1, {"k": "v"}]
        }));
        assert_eq!(flat, json!({"a": "true", "c": [1, {"k": "v"}]}));
    }

    #[test]
    fn kept_attributes_pass_through() {
        let flat = flatten_except(
            json!({"fields": {"amount": "10"}, "sender": {"AddressOwner": "0x1"}}),
            &["fields"],
        );
        assert_eq!(flat, json!({"fields": {"amount": "10"}, "sender": "0x1"}));
    }

    #[test]
    fn non_objects_are_untouched() {
        assert_eq!(flatten(json!("All")), json!("All"));
        assert_eq!(flatten(json!([{"a": {"b": 1}}])), json!([{"a": {"b": 1}}]));
    }
}
