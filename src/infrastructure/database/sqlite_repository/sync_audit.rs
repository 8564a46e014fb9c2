use super::SqliteRepository;
use super::mapper::map_sync_audit_row;
use super::queries::{
    INSERT_SYNC_AUDIT, MARK_SYNC_FINISHED, MARK_SYNC_STARTED, PRUNE_SYNC_AUDIT,
    SELECT_RECENT_SYNC_AUDIT,
};
use crate::application::ports::repositories::SyncAuditRepository;
use crate::domain::entities::{SyncAuditRecord, SyncTask, SyncTaskStatus};
use crate::domain::value_objects::SyncTaskId;
use crate::params;
use crate::shared::error::AppError;
use crate::shared::unix_now;
use async_trait::async_trait;

#[async_trait]
impl SyncAuditRepository for SqliteRepository {
    async fn record_enqueued(&self, task: &SyncTask) -> Result<(), AppError> {
        let payload = serde_json::to_string(&task.payload)?;
        self.store
            .exec(
                INSERT_SYNC_AUDIT,
                &params![
                    task.id.as_str(),
                    task.table.as_str(),
                    task.operation.as_str(),
                    payload,
                    task.priority,
                    task.enqueued_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn mark_started(&self, task_id: &SyncTaskId, attempts: u32) -> Result<(), AppError> {
        self.store
            .exec(
                MARK_SYNC_STARTED,
                &params![attempts, unix_now(), task_id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn mark_finished(
        &self,
        task_id: &SyncTaskId,
        status: SyncTaskStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        self.store
            .exec(
                MARK_SYNC_FINISHED,
                &params![status.as_str(), error_message, unix_now(), task_id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn recent_audit(&self, limit: u32) -> Result<Vec<SyncAuditRecord>, AppError> {
        let rows = self
            .store
            .query(SELECT_RECENT_SYNC_AUDIT, &params![limit])
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(map_sync_audit_row(&row)?);
        }
        Ok(records)
    }

    async fn prune_audit(&self, older_than: i64) -> Result<u64, AppError> {
        self.store.exec(PRUNE_SYNC_AUDIT, &params![older_than]).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::repository;
    use super::*;
    use crate::domain::value_objects::EntityTable;
    use serde_json::json;

    #[tokio::test]
    async fn audit_row_follows_task_lifecycle() {
        let repo = repository().await;
        let task = SyncTask::new(EntityTable::Events, "fetch_one", json!({"event_id": 1}), 1);

        repo.record_enqueued(&task).await.unwrap();
        repo.mark_started(&task.id, 1).await.unwrap();
        repo.mark_finished(&task.id, SyncTaskStatus::Failed, Some("reverted"))
            .await
            .unwrap();

        let records = repo.recent_audit(10).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.task_id, task.id);
        assert_eq!(record.table, EntityTable::Events);
        assert_eq!(record.status, SyncTaskStatus::Failed);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.error_message.as_deref(), Some("reverted"));
        assert!(record.finished_at.is_some());
    }

    #[tokio::test]
    async fn prune_keeps_pending_rows() {
        let repo = repository().await;
        let done = SyncTask::new(EntityTable::Users, "fetch_one", json!({}), 5);
        let pending = SyncTask::new(EntityTable::Users, "fetch_one", json!({"a": 1}), 5);
        repo.record_enqueued(&done).await.unwrap();
        repo.record_enqueued(&pending).await.unwrap();
        repo.mark_finished(&done.id, SyncTaskStatus::Completed, None)
            .await
            .unwrap();

        let removed = repo.prune_audit(unix_now() + 60).await.unwrap();
        assert_eq!(removed, 1);
        let remaining = repo.recent_audit(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].status, SyncTaskStatus::Pending);
    }
}
