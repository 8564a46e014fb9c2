use crate::domain::entities::{SyncOutcome, SyncTask};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// `(table, operation)` ごとの照合処理
#[async_trait]
pub trait SyncTaskHandler: Send + Sync {
    async fn handle(&self, task: &SyncTask) -> Result<SyncOutcome, AppError>;
}
