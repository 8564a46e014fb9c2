use crate::application::ports::cache::ContentCachePort;
use crate::application::ports::repositories::SyncAuditRepository;
use crate::shared::error::AppError;
use crate::shared::unix_now;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// 期限切れコンテンツと古い監査行の掃除
pub struct CacheCleanupJob {
    content_cache: Arc<dyn ContentCachePort>,
    audit: Arc<dyn SyncAuditRepository>,
    audit_retention_days: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCleanupRunStats {
    pub expired_content: u64,
    pub pruned_audit_rows: u64,
    pub remaining_content: u64,
    pub audit_cutoff: i64,
}

impl CacheCleanupJob {
    pub fn new(
        content_cache: Arc<dyn ContentCachePort>,
        audit: Arc<dyn SyncAuditRepository>,
        audit_retention_days: u64,
    ) -> Self {
        Self {
            content_cache,
            audit,
            audit_retention_days,
        }
    }

    pub async fn run_once(&self) -> Result<CacheCleanupRunStats, AppError> {
        let started = Instant::now();
        let result = self.execute_once().await;
        let duration_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;

        match &result {
            Ok(stats) => {
                tracing::info!(
                    target: "jobs::cleanup",
                    expired_content = stats.expired_content,
                    pruned_audit_rows = stats.pruned_audit_rows,
                    remaining_content = stats.remaining_content,
                    audit_cutoff = stats.audit_cutoff,
                    duration_ms,
                    "cache cleanup job completed"
                );
            }
            Err(err) => {
                tracing::warn!(
                    target: "jobs::cleanup",
                    error = %err,
                    duration_ms,
                    "cache cleanup job failed"
                );
            }
        }

        result
    }

    async fn execute_once(&self) -> Result<CacheCleanupRunStats, AppError> {
        let now = unix_now();
        let expired_content = self.content_cache.remove_expired(now).await?;

        let retention = i64::try_from(self.audit_retention_days)
            .unwrap_or(i64::MAX)
            .saturating_mul(SECONDS_PER_DAY);
        let audit_cutoff = now.saturating_sub(retention);
        let pruned_audit_rows = self.audit.prune_audit(audit_cutoff).await?;

        let stats = self.content_cache.stats().await?;
        Ok(CacheCleanupRunStats {
            expired_content,
            pruned_audit_rows,
            remaining_content: stats.total_items,
            audit_cutoff,
        })
    }

    /// `period` ごとに run_once を実行する。初回は1周期後
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                interval.tick().await;
                // 失敗は run_once 内でログ済み。次の周期で再試行する
                let _ = self.run_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ContentPayload, SyncTask, SyncTaskStatus};
    use crate::domain::value_objects::{ContentHash, EntityTable};
    use crate::infrastructure::cache::SqliteContentCache;
    use crate::infrastructure::database::sqlite_repository::test_support::repository;
    use serde_json::json;

    #[tokio::test]
    async fn removes_expired_content_and_keeps_live_rows() {
        let repo = Arc::new(repository().await);
        let cache = Arc::new(SqliteContentCache::new(
            repo.store().clone(),
            Duration::from_secs(3_600),
        ));
        let payload = ContentPayload::Json(json!({"name": "poster"}));
        cache
            .put(&ContentHash::new("bafyOld".into()).unwrap(), &payload, Some(Duration::ZERO))
            .await
            .unwrap();
        cache
            .put(&ContentHash::new("bafyLive".into()).unwrap(), &payload, None)
            .await
            .unwrap();

        let job = CacheCleanupJob::new(cache.clone(), repo.clone(), 7);
        let stats = job.run_once().await.unwrap();

        assert_eq!(stats.expired_content, 1);
        assert_eq!(stats.remaining_content, 1);
        assert_eq!(stats.pruned_audit_rows, 0);
    }

    #[tokio::test]
    async fn zero_retention_prunes_finished_audit_rows() {
        let repo = Arc::new(repository().await);
        let cache = Arc::new(SqliteContentCache::new(
            repo.store().clone(),
            Duration::from_secs(3_600),
        ));
        let task = SyncTask::new(EntityTable::Events, "fetch_all", json!({}), 5);
        repo.record_enqueued(&task).await.unwrap();
        repo.mark_finished(&task.id, SyncTaskStatus::Completed, None)
            .await
            .unwrap();
        // enqueued_at と同一秒だと残るため1秒進める
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        let job = CacheCleanupJob::new(cache, repo.clone(), 0);
        let stats = job.run_once().await.unwrap();

        assert_eq!(stats.pruned_audit_rows, 1);
        assert!(repo.recent_audit(10).await.unwrap().is_empty());
    }
}
