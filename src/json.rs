//! Helpers to combine JSON objects into a single request payload.
//!
//! Keys keep the position of their first appearance. On conflicts the right-hand (later) object
//! wins.

use serde_json::{Map, Value};

/// Merge two JSON objects, preferring the values of `right` on conflicts.
///
/// ## Examples
///
/// ```rust
/// use serde_json::json;
///
/// let left = json!({"Image": "alpine", "Tty": false});
/// let right = json!({"Tty": true, "Cmd": ["sh"]});
///
/// let merged = capstan::json::merge(left.as_object().unwrap(), right.as_object().unwrap());
/// assert_eq!(merged["Tty"], true);
/// assert_eq!(merged["Image"], "alpine");
/// ```
pub fn merge(left: &Map<String, Value>, right: &Map<String, Value>) -> Map<String, Value> {
    merge_all([left, right])
}

/// Merge any number of JSON objects, the last one winning on conflicts.
pub fn merge_all<'a, I>(objects: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut merged = Map::new();
    for object in objects {
        for (key, value) in object {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Merge JSON values that are expected to be objects.
///
/// A value that is not an object contributes nothing.
pub fn merge_values<'a, I>(values: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    Value::Object(merge_all(values.into_iter().filter_map(Value::as_object)))
}

/// Build a JSON object from a single key and value.
pub(crate) fn object<K: Into<String>, V: Into<Value>>(key: K, value: V) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.into(), value.into());
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn right_wins_on_conflicts() {
        let merged = merge(
            &obj(json!({"Name": "web", "Driver": "bridge"})),
            &obj(json!({"Driver": "overlay"})),
        );
        assert_eq!(Value::Object(merged), json!({"Name": "web", "Driver": "overlay"}));
    }

    #[test]
    fn one_sided_keys_are_preserved() {
        let merged = merge(&obj(json!({"a": 1})), &obj(json!({"b": [2]})));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], json!([2]));
    }

    #[test]
    fn empty_object_is_the_identity() {
        let payload = obj(json!({"Image": "alpine", "Labels": {"a": "b"}}));
        assert_eq!(merge(&payload, &Map::new()), payload);
        assert_eq!(merge(&Map::new(), &payload), payload);
    }

    #[test]
    fn keeps_first_position_of_keys() {
        let merged = merge_all([
            &obj(json!({"first": 1, "second": 2})),
            &obj(json!({"third": 3})),
            &obj(json!({"first": 10})),
        ]);
        assert_eq!(merged.keys().collect::<Vec<_>>(), ["first", "second", "third"]);
        assert_eq!(merged["first"], 10);
    }

    #[test]
    fn non_objects_are_ignored() {
        let merged = merge_values([&json!({"a": 1}), &json!("nope"), &json!({"b": 2})]);
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }
}
