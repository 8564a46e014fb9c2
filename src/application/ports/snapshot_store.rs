use crate::shared::error::AppError;
use async_trait::async_trait;

/// キャッシュストアのスナップショットを保持する永続ブロブ
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<Vec<u8>>, AppError>;

    async fn save(&self, bytes: &[u8]) -> Result<(), AppError>;
}
