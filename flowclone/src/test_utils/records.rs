use serde_json::json;

use crate::types::Record;

/// Creates `count` records of the shape `{"id": <n>, "name": "record-<n>"}`.
pub fn records(count: u64) -> Vec<Record> {
    (0..count).map(record).collect()
}

pub fn record(id: u64) -> Record {
    Record::new(json!({ "id": id, "name": format!("record-{id}") }))
}

/// Returns the `id` of a record created by [`record`].
pub fn record_id(record: &Record) -> Option<u64> {
    record.value().get("id").and_then(|id| id.as_u64())
}
