use crate::domain::entities::{
    Event, EventFilter, ListingFilter, MarketplaceListing, SyncAuditRecord, SyncTask,
    SyncTaskStatus, Ticket, User,
};
use crate::domain::value_objects::{EntityTable, SyncTaskId};
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn upsert_events(&self, events: &[Event]) -> Result<u64, AppError>;
    async fn get_event(&self, event_id: u64) -> Result<Option<Event>, AppError>;
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError>;
    async fn search_events(&self, query: &str, limit: u32) -> Result<Vec<Event>, AppError>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn upsert_tickets(&self, tickets: &[Ticket]) -> Result<u64, AppError>;
    async fn get_ticket(
        &self,
        contract_address: &str,
        token_id: &str,
    ) -> Result<Option<Ticket>, AppError>;
    async fn tickets_by_owner(&self, owner: &str) -> Result<Vec<Ticket>, AppError>;
}

#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn upsert_listings(&self, listings: &[MarketplaceListing]) -> Result<u64, AppError>;
    async fn list_listings(&self, filter: &ListingFilter)
        -> Result<Vec<MarketplaceListing>, AppError>;
    /// `active_ids` に含まれない有効な出品を無効化する
    async fn deactivate_missing(&self, active_ids: &[u64], synced_at: i64)
        -> Result<u64, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn upsert_user(&self, user: &User) -> Result<u64, AppError>;
    async fn get_user(&self, address: &str) -> Result<Option<User>, AppError>;
    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<User>, AppError>;
}

#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// key 指定時は該当範囲、None の場合はテーブル全体取得の最終同期時刻
    async fn last_synced(
        &self,
        table: EntityTable,
        key: Option<&str>,
    ) -> Result<Option<i64>, AppError>;
    /// 取得が成功した範囲を記録する。結果が0件でも記録する
    async fn mark_synced(
        &self,
        table: EntityTable,
        scope: Option<&str>,
        synced_at: i64,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait SyncAuditRepository: Send + Sync {
    async fn record_enqueued(&self, task: &SyncTask) -> Result<(), AppError>;
    async fn mark_started(&self, task_id: &SyncTaskId, attempts: u32) -> Result<(), AppError>;
    async fn mark_finished(
        &self,
        task_id: &SyncTaskId,
        status: SyncTaskStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError>;
    async fn recent_audit(&self, limit: u32) -> Result<Vec<SyncAuditRecord>, AppError>;
    async fn prune_audit(&self, older_than: i64) -> Result<u64, AppError>;
}
