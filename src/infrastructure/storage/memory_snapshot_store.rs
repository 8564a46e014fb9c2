use crate::application::ports::snapshot_store::SnapshotStore;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// プロセス内だけで保持するスナップショット
#[derive(Default)]
pub struct MemorySnapshotStore {
    bytes: RwLock<Option<Vec<u8>>>,
    saves: AtomicU64,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: RwLock::new(Some(bytes)),
            saves: AtomicU64::new(0),
        }
    }

    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.bytes.read().await.clone())
    }

    async fn save(&self, bytes: &[u8]) -> Result<(), AppError> {
        *self.bytes.write().await = Some(bytes.to_vec());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
