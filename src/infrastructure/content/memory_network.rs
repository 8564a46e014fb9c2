use crate::application::ports::content_network::ContentNetwork;
use crate::domain::entities::ContentPayload;
use crate::domain::value_objects::{ContentHash, ContentKind};
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// SHA-256 でアドレス付けするインメモリのコンテンツネットワーク
pub struct MemoryContentNetwork {
    name: String,
    blobs: RwLock<HashMap<String, Bytes>>,
    available: AtomicBool,
    fetches: AtomicU64,
    publishes: AtomicU64,
}

impl MemoryContentNetwork {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blobs: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            fetches: AtomicU64::new(0),
            publishes: AtomicU64::new(0),
        }
    }

    pub fn address_of(bytes: &[u8]) -> Result<ContentHash, AppError> {
        let digest = Sha256::digest(bytes);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        ContentHash::new(hex).map_err(AppError::Internal)
    }

    /// 任意のハッシュでコンテンツを配置する
    pub fn insert(&self, hash: &ContentHash, payload: &ContentPayload) -> Result<(), AppError> {
        let bytes = Bytes::from(payload.to_bytes()?);
        self.write_blobs()?.insert(hash.as_str().to_string(), bytes);
        Ok(())
    }

    /// false の間は全呼び出しが `AppError::Network` になる
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), AppError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Network(format!("{} is unreachable", self.name)))
        }
    }

    fn write_blobs(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Bytes>>, AppError> {
        self.blobs
            .write()
            .map_err(|_| AppError::Internal("content store lock poisoned".to_string()))
    }
}

impl Default for MemoryContentNetwork {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl ContentNetwork for MemoryContentNetwork {
    async fn publish(&self, payload: &ContentPayload) -> Result<ContentHash, AppError> {
        self.ensure_available()?;
        let bytes = payload.to_bytes()?;
        let hash = Self::address_of(&bytes)?;
        self.write_blobs()?
            .insert(hash.as_str().to_string(), Bytes::from(bytes));
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Ok(hash)
    }

    async fn fetch(
        &self,
        hash: &ContentHash,
        kind: ContentKind,
    ) -> Result<Option<ContentPayload>, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        let bytes = {
            let blobs = self
                .blobs
                .read()
                .map_err(|_| AppError::Internal("content store lock poisoned".to_string()))?;
            blobs.get(hash.as_str()).cloned()
        };
        match bytes {
            Some(bytes) => Ok(Some(ContentPayload::from_bytes(kind, &bytes)?)),
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_is_content_addressed() {
        let network = MemoryContentNetwork::default();
        let payload = ContentPayload::Json(json!({"name": "Gala", "image": "ipfs://bafyImg"}));

        let first = network.publish(&payload).await.unwrap();
        let second = network.publish(&payload).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);

        let fetched = network.fetch(&first, ContentKind::Metadata).await.unwrap();
        assert_eq!(fetched, Some(payload));
        assert_eq!(network.fetch_count(), 1);
    }

    #[tokio::test]
    async fn unavailable_network_is_transient() {
        let network = MemoryContentNetwork::default();
        network.set_available(false);
        let err = network
            .publish(&ContentPayload::Binary(Bytes::from_static(b"x")))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
