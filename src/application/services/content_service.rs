use crate::application::ports::cache::ContentCachePort;
use crate::application::ports::content_network::ContentNetwork;
use crate::domain::entities::{ContentCacheStats, ContentPayload};
use crate::domain::value_objects::{ContentHash, ContentKind};
use crate::shared::error::AppError;
use serde_json::Value;
use std::sync::Arc;

/// キャッシュを前段に置いたコンテンツネットワークアクセス
pub struct ContentService {
    cache: Arc<dyn ContentCachePort>,
    network: Arc<dyn ContentNetwork>,
    gateway_base: String,
}

impl ContentService {
    pub fn new(
        cache: Arc<dyn ContentCachePort>,
        network: Arc<dyn ContentNetwork>,
        gateway_base: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            network,
            gateway_base: gateway_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// キャッシュにあればネットワークへは問い合わせない。存在しない場合は `Ok(None)`
    pub async fn cache_content(
        &self,
        hash: &ContentHash,
        kind: ContentKind,
    ) -> Result<Option<ContentPayload>, AppError> {
        if let Some(cached) = self.cache.get(hash, kind).await? {
            tracing::debug!(
                target: "cache::content",
                hash = %hash,
                access_count = cached.access_count,
                "content cache hit"
            );
            return Ok(Some(cached.payload));
        }

        let Some(payload) = self.network.fetch(hash, kind).await? else {
            tracing::debug!(target: "cache::content", hash = %hash, "content not found on network");
            return Ok(None);
        };

        if let Err(err) = self.cache.put(hash, &payload, None).await {
            tracing::warn!(
                target: "cache::content",
                hash = %hash,
                error = %err,
                "failed to cache fetched content"
            );
        }
        Ok(Some(payload))
    }

    /// 公開したコンテンツはそのままキャッシュへ投入する
    pub async fn publish(&self, payload: &ContentPayload) -> Result<ContentHash, AppError> {
        let hash = self.network.publish(payload).await?;
        self.cache.put(&hash, payload, None).await?;
        tracing::info!(
            target: "cache::content",
            hash = %hash,
            kind = %payload.kind(),
            "published content"
        );
        Ok(hash)
    }

    pub async fn resolve_metadata(&self, uri: &str) -> Result<Option<Value>, AppError> {
        let hash = ContentHash::from_uri(uri).map_err(AppError::InvalidInput)?;
        let payload = self.cache_content(&hash, ContentKind::Metadata).await?;
        Ok(payload.and_then(ContentPayload::into_json))
    }

    /// 表示用 URL。HTTP(S) の URL はそのまま返す
    pub fn image_url(&self, uri: &str) -> Option<String> {
        let uri = uri.trim();
        if uri.is_empty() {
            return None;
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Some(uri.to_string());
        }
        ContentHash::from_uri(uri)
            .ok()
            .map(|hash| hash.gateway_url(&self.gateway_base))
    }

    pub async fn stats(&self) -> Result<ContentCacheStats, AppError> {
        self.cache.stats().await
    }

    pub async fn clear(&self) -> Result<u64, AppError> {
        self.cache.clear().await
    }
}
