use crate::domain::value_objects::{ContentHash, ContentKind};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ContentPayload {
    Json(Value),
    Binary(Bytes),
}

impl ContentPayload {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentPayload::Json(_) => ContentKind::Metadata,
            ContentPayload::Binary(_) => ContentKind::Binary,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ContentPayload::Json(value) => Some(value),
            ContentPayload::Binary(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ContentPayload::Json(value) => Some(value),
            ContentPayload::Binary(_) => None,
        }
    }

    /// ネットワーク送出・ハッシュ計算用のバイト列
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            ContentPayload::Json(value) => serde_json::to_vec(value),
            ContentPayload::Binary(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn from_bytes(kind: ContentKind, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        match kind {
            ContentKind::Metadata => Ok(ContentPayload::Json(serde_json::from_slice(bytes)?)),
            ContentKind::Binary => Ok(ContentPayload::Binary(Bytes::copy_from_slice(bytes))),
        }
    }
}

/// content_cache テーブルの1行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedContent {
    pub hash: ContentHash,
    pub payload: ContentPayload,
    pub expires_at: i64,
    pub access_count: u64,
    pub last_accessed: i64,
}

impl CachedContent {
    pub fn is_live(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentCacheStats {
    pub total_items: u64,
    pub expired_items: u64,
    pub total_accesses: u64,
}
