use crate::domain::value_objects::{EntityTable, SyncTaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const PRIORITY_URGENT: i32 = 1;
pub const PRIORITY_DEFAULT: i32 = 5;

/// 1単位の照合作業。値が小さいほど優先
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    pub id: SyncTaskId,
    pub table: EntityTable,
    pub operation: String,
    pub payload: Value,
    pub priority: i32,
    pub enqueued_at: i64,
}

impl SyncTask {
    pub fn new(table: EntityTable, operation: impl Into<String>, payload: Value, priority: i32) -> Self {
        Self {
            id: SyncTaskId::generate(),
            table,
            operation: operation.into(),
            payload,
            priority,
            enqueued_at: chrono::Utc::now().timestamp(),
        }
    }

    /// 同一作業かどうか（ID・優先度は比較しない）
    pub fn same_work(&self, table: EntityTable, operation: &str, payload: &Value) -> bool {
        self.table == table && self.operation == operation && &self.payload == payload
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SyncTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTaskStatus::Pending => "pending",
            SyncTaskStatus::Processing => "processing",
            SyncTaskStatus::Completed => "completed",
            SyncTaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ハンドラーの処理結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub upserted: u64,
    /// 書き込み系操作のトランザクションハッシュ
    pub tx_hash: Option<String>,
}

impl SyncOutcome {
    pub fn upserted(count: u64) -> Self {
        Self {
            upserted: count,
            tx_hash: None,
        }
    }
}

/// sync_queue 監査テーブルの1行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncAuditRecord {
    pub task_id: SyncTaskId,
    pub table: EntityTable,
    pub operation: String,
    pub priority: i32,
    pub status: SyncTaskStatus,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub enqueued_at: i64,
    pub finished_at: Option<i64>,
}
