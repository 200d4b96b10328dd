//! Helpers for picking apart remote JSON payloads.
//!
//! The remote service wraps lists inconsistently: some endpoints return a bare
//! array, others an object with the list under a well-known key.

use quarry_core::ItemId;
use serde_json::Value;
use std::collections::BTreeSet;

/// Keys a list may hide under, in lookup order.
const LIST_KEYS: [&str; 7] = [
    "items",
    "projects",
    "trackers",
    "fields",
    "children",
    "relations",
    "references",
];

/// Keys a bulk response may report per-item failures under.
const FAILURE_KEYS: [&str; 3] = ["failed", "failures", "errors"];

/// The list carried by a payload, or empty if it carries none.
pub fn entries(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(values) => values.clone(),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

pub fn item_id(item: &Value) -> Option<ItemId> {
    item.get("id").and_then(Value::as_u64).map(ItemId::new)
}

/// Ids of every entry in a payload's list.
pub fn item_ids(payload: &Value) -> BTreeSet<ItemId> {
    entries(payload).iter().filter_map(item_id).collect()
}

/// Parent reference of an item: `{"parent": {"id": n}}`.
pub fn parent_id(item: &Value) -> Option<ItemId> {
    item.get("parent")
        .and_then(|parent| parent.get("id"))
        .and_then(Value::as_u64)
        .map(ItemId::new)
}

/// Total match count, if the payload reports one.
pub fn total(payload: &Value) -> Option<u64> {
    payload.get("total").and_then(Value::as_u64)
}

/// Keep only `id` and the named fields of an item.
pub fn project_fields(item: &Value, fields: &BTreeSet<String>) -> Value {
    match item {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() == "id" || fields.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Per-item failure entries reported by a bulk write.
pub fn failures(response: &Value) -> Vec<Value> {
    FAILURE_KEYS
        .iter()
        .find_map(|key| response.get(*key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}
