use crate::domain::entities::ContentPayload;
use crate::domain::value_objects::{ContentHash, ContentKind};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 分散コンテンツネットワークへのアクセス
#[async_trait]
pub trait ContentNetwork: Send + Sync {
    async fn publish(&self, payload: &ContentPayload) -> Result<ContentHash, AppError>;

    /// 見つからない場合は `Ok(None)`
    async fn fetch(
        &self,
        hash: &ContentHash,
        kind: ContentKind,
    ) -> Result<Option<ContentPayload>, AppError>;

    /// ログ用の識別名
    fn name(&self) -> &str;
}
