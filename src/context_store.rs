//! In-memory per-session context records.
//!
//! Records are arbitrary client JSON stamped with `lastUpdated`. They live for
//! the lifetime of the process; nothing expires and nothing is persisted.

use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const LAST_UPDATED_FIELD: &str = "lastUpdated";

#[derive(Clone, Default)]
pub struct ContextStore {
    records: Arc<DashMap<String, Value>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for `id` with `body` stamped with the current time.
    pub fn upsert(&self, id: &str, body: Value) -> Value {
        self.upsert_at(id, body, Utc::now())
    }

    /// Replace the record for `id`, stamping it with `now`. Returns the stored
    /// record. Any prior record is dropped, not merged.
    pub fn upsert_at(&self, id: &str, body: Value, now: DateTime<Utc>) -> Value {
        let mut record = into_object(body);
        record.insert(
            LAST_UPDATED_FIELD.to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        let record = Value::Object(record);
        self.records.insert(id.to_string(), record.clone());
        record
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.records.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Objects are kept as-is, arrays become index-keyed objects, scalars and
/// null carry no fields.
fn into_object(body: Value) -> Map<String, Value> {
    match body {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_upsert_then_get_adds_timestamp() {
        let store = ContextStore::new();
        store.upsert_at("rex", json!({"breed": "lab"}), fixed_time());

        assert_eq!(
            store.get("rex"),
            Some(json!({"breed": "lab", "lastUpdated": "2024-03-01T12:30:00.000Z"}))
        );
    }

    #[test]
    fn test_second_upsert_replaces_without_merge() {
        let store = ContextStore::new();
        store.upsert("rex", json!({"breed": "lab", "age": 3}));
        store.upsert("rex", json!({"mood": "happy"}));

        let record = store.get("rex").unwrap();
        assert_eq!(record["mood"], "happy");
        assert!(record.get("breed").is_none());
        assert!(record.get("age").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_client_timestamp_is_overwritten() {
        let store = ContextStore::new();
        let record = store.upsert_at("a", json!({"lastUpdated": "yesterday"}), fixed_time());
        assert_eq!(record["lastUpdated"], "2024-03-01T12:30:00.000Z");
    }

    #[test]
    fn test_missing_id() {
        let store = ContextStore::new();
        assert!(store.is_empty());
        assert!(store.get("unknown").is_none());
    }

    #[test]
    fn test_non_object_bodies() {
        let store = ContextStore::new();
        let from_array = store.upsert_at("a", json!(["x", "y"]), fixed_time());
        assert_eq!(from_array["0"], "x");
        assert_eq!(from_array["1"], "y");

        let from_null = store.upsert_at("b", Value::Null, fixed_time());
        assert_eq!(from_null, json!({"lastUpdated": "2024-03-01T12:30:00.000Z"}));
    }

    #[test]
    fn test_clones_share_records() {
        let store = ContextStore::new();
        let handle = store.clone();
        handle.upsert("shared", json!({}));
        assert!(store.get("shared").is_some());
    }
}
