//! PropertyMap — the key-value store on nodes and relationships.

use std::collections::HashMap;
use super::Value;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;

/// Convert a list of (key, value) pairs into a map value.
impl<K, V> From<Vec<(K, V)>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Convert a `PropertyMap` into the JSON object a push sends as `data`.
pub fn to_json(properties: PropertyMap) -> serde_json::Map<String, serde_json::Value> {
    properties.into_iter().map(|(k, v)| (k, v.into())).collect()
}

/// Build a `PropertyMap` from the `data` object of a resource payload.
///
/// Anything other than a JSON object yields an empty map.
pub fn from_json(data: &serde_json::Value) -> PropertyMap {
    match data {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect(),
        _ => PropertyMap::new(),
    }
}
