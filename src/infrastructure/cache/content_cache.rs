use crate::application::ports::cache::ContentCachePort;
use crate::domain::entities::{CachedContent, ContentCacheStats, ContentPayload};
use crate::domain::value_objects::{ContentHash, ContentKind};
use crate::infrastructure::database::CacheStore;
use crate::params;
use crate::shared::error::AppError;
use crate::shared::unix_now;
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{Row, sqlite::SqliteRow};
use std::sync::Arc;
use std::time::Duration;

const TOUCH_LIVE_CONTENT: &str = r#"
    UPDATE content_cache
    SET access_count = access_count + 1, last_accessed = ?
    WHERE hash = ? AND content_type = ? AND expires_at > ?
"#;

const SELECT_CONTENT: &str = r#"
    SELECT hash, content_type, json_payload, binary_payload, expires_at, access_count,
           last_accessed
    FROM content_cache
    WHERE hash = ?
"#;

const UPSERT_CONTENT: &str = r#"
    INSERT INTO content_cache (
        hash, content_type, json_payload, binary_payload, expires_at, access_count,
        last_accessed, created_at
    )
    VALUES (?, ?, ?, ?, ?, 1, ?, ?)
    ON CONFLICT(hash) DO UPDATE SET
        content_type = excluded.content_type,
        json_payload = excluded.json_payload,
        binary_payload = excluded.binary_payload,
        expires_at = excluded.expires_at,
        access_count = content_cache.access_count + 1,
        last_accessed = excluded.last_accessed
"#;

const DELETE_EXPIRED_CONTENT: &str = "DELETE FROM content_cache WHERE expires_at <= ?";
const DELETE_ALL_CONTENT: &str = "DELETE FROM content_cache";

const SELECT_CONTENT_STATS: &str = r#"
    SELECT
        COUNT(*) AS total_items,
        COALESCE(SUM(CASE WHEN expires_at <= ? THEN 1 ELSE 0 END), 0) AS expired_items,
        COALESCE(SUM(access_count), 0) AS total_accesses
    FROM content_cache
"#;

/// content_cache テーブル上のコンテンツキャッシュ
pub struct SqliteContentCache {
    store: Arc<CacheStore>,
    default_ttl: Duration,
}

impl SqliteContentCache {
    pub fn new(store: Arc<CacheStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    async fn select(&self, hash: &ContentHash) -> Result<Option<CachedContent>, AppError> {
        let row = self
            .store
            .query_optional(SELECT_CONTENT, &params![hash.as_str()])
            .await?;
        match row {
            Some(row) => Ok(Some(map_content_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn map_content_row(row: &SqliteRow) -> Result<CachedContent, AppError> {
    let hash: String = row.try_get("hash")?;
    let content_type: String = row.try_get("content_type")?;
    let kind = content_type
        .parse::<ContentKind>()
        .map_err(AppError::Database)?;

    let payload = match kind {
        ContentKind::Metadata => {
            let json: Option<String> = row.try_get("json_payload")?;
            let json = json.ok_or_else(|| {
                AppError::Database(format!("Metadata row {hash} has no JSON payload"))
            })?;
            ContentPayload::Json(serde_json::from_str(&json)?)
        }
        ContentKind::Binary => {
            let blob: Option<Vec<u8>> = row.try_get("binary_payload")?;
            ContentPayload::Binary(Bytes::from(blob.unwrap_or_default()))
        }
    };

    let access_count: i64 = row.try_get("access_count")?;
    Ok(CachedContent {
        hash: ContentHash::new(hash).map_err(AppError::Database)?,
        payload,
        expires_at: row.try_get("expires_at")?,
        access_count: access_count.max(0) as u64,
        last_accessed: row.try_get("last_accessed")?,
    })
}

#[async_trait]
impl ContentCachePort for SqliteContentCache {
    async fn get(
        &self,
        hash: &ContentHash,
        kind: ContentKind,
    ) -> Result<Option<CachedContent>, AppError> {
        let now = unix_now();
        let touched = self
            .store
            .exec(
                TOUCH_LIVE_CONTENT,
                &params![now, hash.as_str(), kind.as_str(), now],
            )
            .await?;
        if touched == 0 {
            tracing::debug!(target: "cache::content", hash = %hash, kind = %kind, "content cache miss");
            return Ok(None);
        }
        self.select(hash).await
    }

    async fn put(
        &self,
        hash: &ContentHash,
        payload: &ContentPayload,
        ttl: Option<Duration>,
    ) -> Result<CachedContent, AppError> {
        let now = unix_now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));

        let (json, blob) = match payload {
            ContentPayload::Json(value) => (Some(serde_json::to_string(value)?), None),
            ContentPayload::Binary(bytes) => (None, Some(bytes.to_vec())),
        };

        self.store
            .exec(
                UPSERT_CONTENT,
                &params![
                    hash.as_str(),
                    payload.kind().as_str(),
                    json,
                    blob,
                    expires_at,
                    now,
                    now,
                ],
            )
            .await?;

        self.select(hash)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Content {hash} vanished after upsert")))
    }

    async fn remove_expired(&self, now: i64) -> Result<u64, AppError> {
        self.store.exec(DELETE_EXPIRED_CONTENT, &params![now]).await
    }

    async fn clear(&self) -> Result<u64, AppError> {
        self.store.exec(DELETE_ALL_CONTENT, &[]).await
    }

    async fn stats(&self) -> Result<ContentCacheStats, AppError> {
        let rows = self
            .store
            .query(SELECT_CONTENT_STATS, &params![unix_now()])
            .await?;
        let Some(row) = rows.first() else {
            return Ok(ContentCacheStats::default());
        };

        let total_items: i64 = row.try_get("total_items")?;
        let expired_items: i64 = row.try_get("expired_items")?;
        let total_accesses: i64 = row.try_get("total_accesses")?;
        Ok(ContentCacheStats {
            total_items: total_items.max(0) as u64,
            expired_items: expired_items.max(0) as u64,
            total_accesses: total_accesses.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemorySnapshotStore;
    use serde_json::json;

    async fn cache() -> SqliteContentCache {
        let store = CacheStore::open(Arc::new(MemorySnapshotStore::new()))
            .await
            .unwrap();
        SqliteContentCache::new(store, Duration::from_secs(86_400))
    }

    fn hash(value: &str) -> ContentHash {
        ContentHash::new(value.to_string()).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_counts_accesses() {
        let cache = cache().await;
        let payload = ContentPayload::Json(json!({"name": "Ticket"}));

        let stored = cache.put(&hash("bafyA"), &payload, None).await.unwrap();
        assert_eq!(stored.access_count, 1);

        let hit = cache
            .get(&hash("bafyA"), ContentKind::Metadata)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.payload, payload);
        assert_eq!(hit.access_count, 2);
        assert!(hit.last_accessed >= stored.last_accessed);
    }

    #[tokio::test]
    async fn replace_keeps_single_row_and_increments() {
        let cache = cache().await;
        cache
            .put(&hash("bafyA"), &ContentPayload::Json(json!({"v": 1})), None)
            .await
            .unwrap();
        let replaced = cache
            .put(&hash("bafyA"), &ContentPayload::Json(json!({"v": 2})), None)
            .await
            .unwrap();

        assert_eq!(replaced.access_count, 2);
        assert_eq!(replaced.payload, ContentPayload::Json(json!({"v": 2})));
        assert_eq!(cache.stats().await.unwrap().total_items, 1);
    }

    #[tokio::test]
    async fn expired_or_mismatched_kind_is_a_miss() {
        let cache = cache().await;
        cache
            .put(
                &hash("bafyOld"),
                &ContentPayload::Json(json!({})),
                Some(Duration::ZERO),
            )
            .await
            .unwrap();
        cache
            .put(
                &hash("bafyImg"),
                &ContentPayload::Binary(Bytes::from_static(b"png")),
                None,
            )
            .await
            .unwrap();

        assert!(cache
            .get(&hash("bafyOld"), ContentKind::Metadata)
            .await
            .unwrap()
            .is_none());
        assert!(cache
            .get(&hash("bafyImg"), ContentKind::Metadata)
            .await
            .unwrap()
            .is_none());
        let image = cache
            .get(&hash("bafyImg"), ContentKind::Binary)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.payload, ContentPayload::Binary(Bytes::from_static(b"png")));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.expired_items, 1);
        assert_eq!(cache.remove_expired(unix_now()).await.unwrap(), 1);
        assert_eq!(cache.clear().await.unwrap(), 1);
    }
}
