use crate::domain::value_objects::EntityTable;
use serde::Serialize;
use serde_json::Value;

pub const SYNC_STARTED: &str = "sync_started";
pub const SYNC_PROGRESS: &str = "sync_progress";
pub const SYNC_ERROR: &str = "sync_error";
pub const CACHE_CLEARED: &str = "cache_cleared";

/// `<table>_synced`
pub fn synced_event(table: EntityTable) -> String {
    format!("{}_synced", table.as_str())
}

/// `<table>_created`
pub fn created_event(table: EntityTable) -> String {
    format!("{}_created", table.as_str())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub name: String,
    pub data: Value,
    pub emitted_at: i64,
}

impl Notification {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            emitted_at: chrono::Utc::now().timestamp(),
        }
    }
}
