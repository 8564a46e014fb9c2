use crate::application::ports::content_network::ContentNetwork;
use crate::application::ports::ledger_client::LedgerClient;
use crate::application::ports::repositories::SyncAuditRepository;
use crate::application::ports::snapshot_store::SnapshotStore;
use crate::application::services::{
    ContentService, LedgerSyncHandler, NotificationBus, QueryService, SearchResults,
    StalenessPolicy, Subscription, SyncOrchestrator, SyncSettings, SyncStatusSnapshot,
};
use crate::domain::entities::notification::CACHE_CLEARED;
use crate::domain::entities::{
    ContentCacheStats, ContentPayload, Enhanced, Event, EventFilter, ListingFilter,
    MarketplaceListing, Notification, SearchScope, SyncAuditRecord, Ticket, User,
};
use crate::domain::value_objects::{ContentHash, ContentKind, EntityTable, SyncTaskId};
use crate::infrastructure::cache::SqliteContentCache;
use crate::infrastructure::content::{GatewayFailover, HttpGateway};
use crate::infrastructure::database::{CacheStore, SqliteRepository};
use crate::infrastructure::jobs::CacheCleanupJob;
use crate::infrastructure::storage::{FileSnapshotStore, MemorySnapshotStore};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// 終了時に実行中の同期タスクを待つ上限
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// プロセス開始時に一度だけ構築し、利用側へ渡すハンドル
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<CacheStore>,
    pub repository: Arc<SqliteRepository>,
    pub bus: NotificationBus,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub content_service: Arc<ContentService>,
    pub query_service: Arc<QueryService>,
    pub cleanup_job: Arc<CacheCleanupJob>,
    background_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl AppState {
    /// 設定からゲートウェイとスナップショットストアを組み立てて初期化する
    pub async fn initialize(
        config: AppConfig,
        ledger: Arc<dyn LedgerClient>,
    ) -> Result<Self, AppError> {
        config.validate().map_err(AppError::Configuration)?;

        let timeout = Duration::from_secs(config.content.request_timeout_secs);
        let mut gateways: Vec<Arc<dyn ContentNetwork>> = Vec::new();
        for base_url in &config.content.gateways {
            gateways.push(Arc::new(HttpGateway::new(base_url.clone(), timeout)?));
        }
        let network: Arc<dyn ContentNetwork> = Arc::new(GatewayFailover::new(gateways)?);

        let snapshot_store: Arc<dyn SnapshotStore> = match &config.storage.snapshot_path {
            Some(path) => Arc::new(FileSnapshotStore::new(path)),
            None => Arc::new(MemorySnapshotStore::new()),
        };

        Self::new(config, ledger, network, snapshot_store).await
    }

    pub async fn new(
        config: AppConfig,
        ledger: Arc<dyn LedgerClient>,
        network: Arc<dyn ContentNetwork>,
        snapshot_store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, AppError> {
        config.validate().map_err(AppError::Configuration)?;
        let gateway_base = config
            .content
            .gateways
            .first()
            .cloned()
            .ok_or_else(|| AppError::Configuration("No content gateway configured".into()))?;

        let store = CacheStore::open(snapshot_store).await?;
        let repository = Arc::new(SqliteRepository::new(Arc::clone(&store)));
        let bus = NotificationBus::new();

        let content_cache = Arc::new(SqliteContentCache::new(
            Arc::clone(&store),
            config.cache.content_ttl(),
        ));
        let content_service = Arc::new(ContentService::new(
            content_cache.clone(),
            network,
            gateway_base,
        ));

        let handler = Arc::new(LedgerSyncHandler::new(
            ledger,
            repository.clone(),
            repository.clone(),
            repository.clone(),
            repository.clone(),
            repository.clone(),
            bus.clone(),
        ));
        let orchestrator = SyncOrchestrator::new(
            handler,
            repository.clone(),
            repository.clone(),
            bus.clone(),
            StalenessPolicy::new(config.sync.staleness_threshold()),
            SyncSettings::from(&config.sync),
        );

        let query_service = Arc::new(QueryService::new(
            repository.clone(),
            repository.clone(),
            repository.clone(),
            repository.clone(),
            Arc::clone(&orchestrator),
            Arc::clone(&content_service),
        ));

        let cleanup_job = Arc::new(CacheCleanupJob::new(
            content_cache,
            repository.clone() as Arc<dyn SyncAuditRepository>,
            config.cache.audit_retention_days,
        ));

        let background_tasks = vec![
            orchestrator.spawn_watchdog(),
            Arc::clone(&cleanup_job).spawn(config.cache.cleanup_interval()),
        ];

        tracing::info!(
            target: "state",
            staleness_secs = config.sync.staleness_threshold_secs,
            content_ttl_secs = config.cache.content_ttl_secs,
            gateways = config.content.gateways.len(),
            persistent = config.storage.snapshot_path.is_some(),
            "ledger cache initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            repository,
            bus,
            orchestrator,
            content_service,
            query_service,
            cleanup_job,
            background_tasks: Arc::new(Mutex::new(background_tasks)),
        })
    }

    pub async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Enhanced<Event>>, AppError> {
        self.query_service.get_events(filter).await
    }

    pub async fn get_event(
        &self,
        event_id: u64,
        force_refresh: bool,
    ) -> Result<Option<Enhanced<Event>>, AppError> {
        self.query_service.get_event(event_id, force_refresh).await
    }

    pub async fn get_user_tickets(
        &self,
        owner: &str,
        force_refresh: bool,
    ) -> Result<Vec<Enhanced<Ticket>>, AppError> {
        self.query_service.get_user_tickets(owner, force_refresh).await
    }

    pub async fn get_marketplace_listings(
        &self,
        filter: &ListingFilter,
    ) -> Result<Vec<MarketplaceListing>, AppError> {
        self.query_service.get_marketplace_listings(filter).await
    }

    pub async fn get_user(
        &self,
        address: &str,
        force_refresh: bool,
    ) -> Result<Option<Enhanced<User>>, AppError> {
        self.query_service.get_user(address, force_refresh).await
    }

    pub async fn search(
        &self,
        query: &str,
        scope: SearchScope,
        limit: Option<u32>,
    ) -> Result<SearchResults, AppError> {
        self.query_service.search(query, scope, limit).await
    }

    pub async fn queue_sync(
        &self,
        table: EntityTable,
        operation: &str,
        payload: Value,
        priority: i32,
    ) -> Result<SyncTaskId, AppError> {
        self.orchestrator
            .queue_sync(table, operation, payload, priority)
            .await
    }

    pub async fn should_sync(&self, table: EntityTable, key: Option<&str>) -> Result<bool, AppError> {
        self.orchestrator.should_sync(table, key).await
    }

    /// content_cache のみを消去する。台帳由来のテーブルは残る
    pub async fn clear_cache(&self) -> Result<u64, AppError> {
        let removed = self.content_service.clear().await?;
        tracing::info!(target: "state", removed, "content cache cleared");
        self.bus.emit(CACHE_CLEARED, json!({"removed": removed}));
        Ok(removed)
    }

    pub async fn cache_content(
        &self,
        hash: &ContentHash,
        kind: ContentKind,
    ) -> Result<Option<ContentPayload>, AppError> {
        self.content_service.cache_content(hash, kind).await
    }

    pub async fn publish_content(&self, payload: &ContentPayload) -> Result<ContentHash, AppError> {
        self.content_service.publish(payload).await
    }

    pub async fn content_stats(&self) -> Result<ContentCacheStats, AppError> {
        self.content_service.stats().await
    }

    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.on(name, handler)
    }

    pub fn sync_status(&self) -> SyncStatusSnapshot {
        self.orchestrator.status()
    }

    pub async fn recent_sync_audit(&self, limit: u32) -> Result<Vec<SyncAuditRecord>, AppError> {
        self.repository.recent_audit(limit).await
    }

    /// キューが空になるまで待つ。`timeout` 超過は `AppError::Timeout`
    pub async fn wait_for_sync(&self, timeout: Option<Duration>) -> Result<(), AppError> {
        match timeout {
            Some(limit) => {
                tokio::time::timeout(limit, self.orchestrator.wait_idle()).await?;
                Ok(())
            }
            None => {
                self.orchestrator.wait_idle().await;
                Ok(())
            }
        }
    }

    /// バックグラウンドタスクを止め、キューが空になるのを待ってからストアを閉じる。
    /// 待機は `SHUTDOWN_GRACE` まで
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        for handle in &handles {
            handle.abort();
        }

        if tokio::time::timeout(SHUTDOWN_GRACE, self.orchestrator.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                target: "state",
                queue_len = self.orchestrator.queue_len(),
                "sync queue still busy at shutdown; closing store anyway"
            );
        }

        self.store.close().await;
        tracing::info!(target: "state", aborted_tasks = handles.len(), "ledger cache shut down");
    }
}
