use crate::domain::entities::{CachedContent, ContentCacheStats, ContentPayload};
use crate::domain::value_objects::{ContentHash, ContentKind};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::time::Duration;

/// コンテンツアドレス指定のキャッシュポート
#[async_trait]
pub trait ContentCachePort: Send + Sync {
    /// 有効な行があればアクセス数を加算して返す。期限切れ・種別違いはミス扱い
    async fn get(
        &self,
        hash: &ContentHash,
        kind: ContentKind,
    ) -> Result<Option<CachedContent>, AppError>;

    /// ハッシュ単位で upsert。ttl 省略時は既定 TTL
    async fn put(
        &self,
        hash: &ContentHash,
        payload: &ContentPayload,
        ttl: Option<Duration>,
    ) -> Result<CachedContent, AppError>;

    async fn remove_expired(&self, now: i64) -> Result<u64, AppError>;

    async fn clear(&self) -> Result<u64, AppError>;

    async fn stats(&self) -> Result<ContentCacheStats, AppError>;
}
