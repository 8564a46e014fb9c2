use super::params::SqlValue;
use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};

pub(crate) const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// スナップショットに含めるテーブル（インポート時はこの順で投入する）
pub(crate) const SNAPSHOT_TABLES: [&str; 7] = [
    "events",
    "tickets",
    "marketplace_listings",
    "users",
    "sync_markers",
    "content_cache",
    "sync_queue",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TableDump {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// キャッシュストア全体の論理ダンプ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoreSnapshot {
    pub format_version: u32,
    pub exported_at: i64,
    pub tables: Vec<TableDump>,
}

impl StoreSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, AppError> {
        Ok(bincode::serde::encode_to_vec(
            self,
            bincode::config::standard(),
        )?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AppError> {
        let (snapshot, _): (StoreSnapshot, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(AppError::CorruptSnapshot(format!(
                "unsupported snapshot format version {}",
                self.format_version
            )));
        }
        for table in &self.tables {
            if !SNAPSHOT_TABLES.contains(&table.name.as_str()) {
                return Err(AppError::CorruptSnapshot(format!(
                    "unknown table in snapshot: {}",
                    table.name
                )));
            }
            if table.columns.is_empty() || !table.columns.iter().all(|c| is_identifier(c)) {
                return Err(AppError::CorruptSnapshot(format!(
                    "invalid column list for table {}",
                    table.name
                )));
            }
            if table.rows.iter().any(|row| row.len() != table.columns.len()) {
                return Err(AppError::CorruptSnapshot(format!(
                    "row width mismatch in table {}",
                    table.name
                )));
            }
        }
        Ok(())
    }
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
