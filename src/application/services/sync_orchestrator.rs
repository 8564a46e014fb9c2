use crate::application::ports::repositories::{SyncAuditRepository, SyncStateRepository};
use crate::application::ports::sync_task_handler::SyncTaskHandler;
use crate::application::services::notification_bus::NotificationBus;
use crate::domain::entities::notification::{SYNC_ERROR, SYNC_PROGRESS, SYNC_STARTED, synced_event};
use crate::domain::entities::{SyncOutcome, SyncTask, SyncTaskStatus};
use crate::domain::value_objects::{EntityTable, SyncTaskId};
use crate::shared::config::{AppConfig, SyncConfig};
use crate::shared::error::AppError;
use crate::shared::metrics::{TaskCounters, TaskCounts};
use crate::shared::unix_now;
use futures::FutureExt;
use rand::Rng;
use serde::Serialize;
use serde_json::{Value, json};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

const MAX_BACKOFF_SHIFT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Draining,
}

/// 最終同期時刻が閾値より古ければ再同期が必要
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
    threshold: Duration,
}

impl StalenessPolicy {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_stale(&self, last_synced: Option<i64>, now: i64) -> bool {
        match last_synced {
            None => true,
            Some(ts) => {
                let threshold = i64::try_from(self.threshold.as_secs()).unwrap_or(i64::MAX);
                now.saturating_sub(ts) > threshold
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub task_timeout: Option<Duration>,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub watchdog_interval: Duration,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            task_timeout: config.task_timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
            watchdog_interval: config.watchdog_interval(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default().sync)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusSnapshot {
    pub state: OrchestratorState,
    pub queue_len: usize,
    pub current_task: Option<SyncTaskId>,
    pub tasks: TaskCounts,
    pub last_error: Option<String>,
}

/// 優先度付きの照合キューと、それを1本ずつ処理するドレインループ
pub struct SyncOrchestrator {
    queue: Mutex<VecDeque<SyncTask>>,
    enqueue_gate: AsyncMutex<()>,
    draining: AtomicBool,
    idle: Notify,
    handler: Arc<dyn SyncTaskHandler>,
    audit: Arc<dyn SyncAuditRepository>,
    sync_state: Arc<dyn SyncStateRepository>,
    bus: NotificationBus,
    staleness: StalenessPolicy,
    settings: SyncSettings,
    counters: TaskCounters,
    current_task: Mutex<Option<SyncTaskId>>,
    last_error: Mutex<Option<String>>,
}

impl SyncOrchestrator {
    pub fn new(
        handler: Arc<dyn SyncTaskHandler>,
        audit: Arc<dyn SyncAuditRepository>,
        sync_state: Arc<dyn SyncStateRepository>,
        bus: NotificationBus,
        staleness: StalenessPolicy,
        settings: SyncSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            enqueue_gate: AsyncMutex::new(()),
            draining: AtomicBool::new(false),
            idle: Notify::new(),
            handler,
            audit,
            sync_state,
            bus,
            staleness,
            settings,
            counters: TaskCounters::new(),
            current_task: Mutex::new(None),
            last_error: Mutex::new(None),
        })
    }

    /// タスクを優先度順（同値は投入順）に積み、停止中ならドレインを開始する
    pub async fn queue_sync(
        self: &Arc<Self>,
        table: EntityTable,
        operation: &str,
        payload: Value,
        priority: i32,
    ) -> Result<SyncTaskId, AppError> {
        let task = Self::build_task(table, operation, payload, priority)?;
        let _gate = self.enqueue_gate.lock().await;
        Ok(self.enqueue(task).await)
    }

    /// 同一の `(table, operation, payload)` が待機中なら積まずに `None` を返す
    pub async fn queue_sync_once(
        self: &Arc<Self>,
        table: EntityTable,
        operation: &str,
        payload: Value,
        priority: i32,
    ) -> Result<Option<SyncTaskId>, AppError> {
        let task = Self::build_task(table, operation, payload, priority)?;
        let _gate = self.enqueue_gate.lock().await;
        let duplicate = lock(&self.queue)
            .iter()
            .any(|pending| pending.same_work(task.table, &task.operation, &task.payload));
        if duplicate {
            tracing::trace!(
                target: "sync::orchestrator",
                table = %task.table,
                operation = %task.operation,
                "identical sync task already pending"
            );
            return Ok(None);
        }
        Ok(Some(self.enqueue(task).await))
    }

    pub async fn should_sync(&self, table: EntityTable, key: Option<&str>) -> Result<bool, AppError> {
        let last_synced = self.last_synced(table, key).await?;
        Ok(self.staleness.is_stale(last_synced, unix_now()))
    }

    pub async fn last_synced(
        &self,
        table: EntityTable,
        key: Option<&str>,
    ) -> Result<Option<i64>, AppError> {
        self.sync_state.last_synced(table, key).await
    }

    pub fn staleness(&self) -> StalenessPolicy {
        self.staleness
    }

    pub fn queue_len(&self) -> usize {
        lock(&self.queue).len()
    }

    /// 待機中タスクのスナップショット（先頭が次に処理される）
    pub fn pending(&self) -> Vec<SyncTask> {
        lock(&self.queue).iter().cloned().collect()
    }

    pub fn state(&self) -> OrchestratorState {
        if self.draining.load(Ordering::SeqCst) {
            OrchestratorState::Draining
        } else {
            OrchestratorState::Idle
        }
    }

    pub fn status(&self) -> SyncStatusSnapshot {
        SyncStatusSnapshot {
            state: self.state(),
            queue_len: self.queue_len(),
            current_task: lock(&self.current_task).clone(),
            tasks: self.counters.counts(),
            last_error: lock(&self.last_error).clone(),
        }
    }

    /// キューが空になりドレインが停止するまで待つ
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// キューが残っているのにドレインが止まっている場合に再起動する
    pub fn spawn_watchdog(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.settings.watchdog_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(orchestrator) = weak.upgrade() else {
                    break;
                };
                if orchestrator.queue_len() > 0 && orchestrator.state() == OrchestratorState::Idle {
                    tracing::warn!(
                        target: "sync::orchestrator",
                        queue_len = orchestrator.queue_len(),
                        "watchdog restarting stalled sync queue"
                    );
                    orchestrator.ensure_draining();
                }
            }
        })
    }

    /// ドレインを起動せずに積む（停止したキューの再現用）
    #[cfg(test)]
    fn push_stalled(&self, task: SyncTask) {
        lock(&self.queue).push_back(task);
    }

    fn is_idle(&self) -> bool {
        !self.draining.load(Ordering::SeqCst) && lock(&self.queue).is_empty()
    }

    fn build_task(
        table: EntityTable,
        operation: &str,
        payload: Value,
        priority: i32,
    ) -> Result<SyncTask, AppError> {
        let operation = operation.trim();
        if operation.is_empty() {
            return Err(AppError::invalid_input("Sync operation cannot be empty"));
        }
        Ok(SyncTask::new(table, operation, payload, priority))
    }

    async fn enqueue(self: &Arc<Self>, task: SyncTask) -> SyncTaskId {
        // ドレイン側の mark_started より先に監査行を作る
        if let Err(err) = self.audit.record_enqueued(&task).await {
            tracing::warn!(
                target: "sync::orchestrator",
                task_id = %task.id,
                error = %err,
                "failed to record sync task audit row"
            );
        }

        let id = task.id.clone();
        let queue_len = {
            let mut queue = lock(&self.queue);
            queue.push_back(task);
            queue.make_contiguous().sort_by_key(|pending| pending.priority);
            queue.len()
        };
        tracing::debug!(target: "sync::orchestrator", task_id = %id, queue_len, "sync task queued");

        self.ensure_draining();
        id
    }

    fn ensure_draining(self: &Arc<Self>) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let orchestrator = Arc::clone(self);
            tokio::spawn(async move {
                orchestrator.drain().await;
            });
        }
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let next = lock(&self.queue).pop_front();
            let Some(task) = next else {
                self.draining.store(false, Ordering::SeqCst);
                self.idle.notify_waiters();
                // 停止処理の間に積まれたタスクを取りこぼさない
                if !lock(&self.queue).is_empty()
                    && self
                        .draining
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                {
                    continue;
                }
                break;
            };
            self.process(task).await;
        }
    }

    async fn process(&self, task: SyncTask) {
        *lock(&self.current_task) = Some(task.id.clone());
        self.bus.emit(
            SYNC_STARTED,
            json!({
                "task_id": task.id.as_str(),
                "table": task.table.as_str(),
                "operation": task.operation,
                "priority": task.priority,
            }),
        );

        let result = self.run_with_retry(&task).await;
        let succeeded = result.is_ok();

        match result {
            Ok(outcome) => self.complete(&task, outcome).await,
            Err(err) => self.fail(&task, err).await,
        }

        *lock(&self.current_task) = None;
        self.bus.emit(
            SYNC_PROGRESS,
            json!({
                "task_id": task.id.as_str(),
                "table": task.table.as_str(),
                "succeeded": succeeded,
                "remaining": self.queue_len(),
            }),
        );
    }

    async fn run_with_retry(&self, task: &SyncTask) -> Result<SyncOutcome, AppError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            if let Err(err) = self.audit.mark_started(&task.id, attempt).await {
                tracing::warn!(
                    target: "sync::orchestrator",
                    task_id = %task.id,
                    error = %err,
                    "failed to mark sync task as started"
                );
            }

            match self.run_once(task).await {
                Err(err) if err.is_transient() && attempt <= self.settings.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        target: "sync::orchestrator",
                        task_id = %task.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient sync failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn run_once(&self, task: &SyncTask) -> Result<SyncOutcome, AppError> {
        let guarded = AssertUnwindSafe(self.handler.handle(task)).catch_unwind();
        let outcome = match self.settings.task_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded).await.map_err(|_| {
                AppError::Timeout(format!(
                    "{}/{} exceeded {}ms",
                    task.table,
                    task.operation,
                    limit.as_millis()
                ))
            })?,
            None => guarded.await,
        };

        match outcome {
            Ok(result) => result,
            Err(panic) => Err(AppError::Internal(format!(
                "sync handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.settings.retry_backoff.as_millis() as u64;
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        let exponential = base.saturating_mul(1u64 << shift);
        let jitter = if base > 1 {
            rand::thread_rng().gen_range(0..=base / 2)
        } else {
            0
        };
        Duration::from_millis(exponential.saturating_add(jitter))
    }

    async fn complete(&self, task: &SyncTask, outcome: SyncOutcome) {
        self.counters.record_success();
        if let Err(err) = self
            .audit
            .mark_finished(&task.id, SyncTaskStatus::Completed, None)
            .await
        {
            tracing::warn!(
                target: "sync::orchestrator",
                task_id = %task.id,
                error = %err,
                "failed to mark sync task as completed"
            );
        }

        tracing::info!(
            target: "sync::orchestrator",
            task_id = %task.id,
            table = %task.table,
            operation = %task.operation,
            upserted = outcome.upserted,
            "sync task completed"
        );
        self.bus.emit(
            &synced_event(task.table),
            json!({
                "task_id": task.id.as_str(),
                "operation": task.operation,
                "upserted": outcome.upserted,
                "tx_hash": outcome.tx_hash,
            }),
        );
    }

    async fn fail(&self, task: &SyncTask, err: AppError) {
        self.counters.record_failure();
        let message = err.to_string();
        *lock(&self.last_error) = Some(message.clone());

        if let Err(audit_err) = self
            .audit
            .mark_finished(&task.id, SyncTaskStatus::Failed, Some(&message))
            .await
        {
            tracing::warn!(
                target: "sync::orchestrator",
                task_id = %task.id,
                error = %audit_err,
                "failed to mark sync task as failed"
            );
        }

        tracing::error!(
            target: "sync::orchestrator",
            task_id = %task.id,
            table = %task.table,
            operation = %task.operation,
            error = %message,
            "sync task failed"
        );
        self.bus.emit(
            SYNC_ERROR,
            json!({
                "task_id": task.id.as_str(),
                "table": task.table.as_str(),
                "operation": task.operation,
                "error": message,
            }),
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::repositories::SyncAuditRepository;
    use crate::domain::entities::{PRIORITY_DEFAULT, PRIORITY_URGENT};
    use crate::infrastructure::database::sqlite_repository::test_support::repository;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Semaphore;

    /// 呼び出し順を記録し、`release` されるまで最初のタスクで止まるハンドラー
    struct ScriptedHandler {
        calls: Mutex<Vec<String>>,
        gate: Semaphore,
        transient_failures: AtomicU32,
    }

    impl ScriptedHandler {
        fn new(gated: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                gate: Semaphore::new(if gated { 0 } else { Semaphore::MAX_PERMITS }),
                transient_failures: AtomicU32::new(0),
            })
        }

        fn release(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SyncTaskHandler for ScriptedHandler {
        async fn handle(&self, task: &SyncTask) -> Result<SyncOutcome, AppError> {
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
            self.calls.lock().unwrap().push(task.operation.clone());
            match task.operation.as_str() {
                "explode" => Err(AppError::LedgerReverted("bad id".into())),
                "panic" => panic!("handler bug"),
                "sleep" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(SyncOutcome::default())
                }
                "flaky" => {
                    if self.transient_failures.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AppError::Network("connection reset".into()))
                    } else {
                        Ok(SyncOutcome::upserted(1))
                    }
                }
                _ => Ok(SyncOutcome::upserted(1)),
            }
        }
    }

    async fn orchestrator(
        handler: Arc<ScriptedHandler>,
        settings: SyncSettings,
    ) -> (Arc<SyncOrchestrator>, NotificationBus, Arc<dyn SyncAuditRepository>) {
        let repo = Arc::new(repository().await);
        let bus = NotificationBus::new();
        let orchestrator = SyncOrchestrator::new(
            handler,
            repo.clone(),
            repo.clone(),
            bus.clone(),
            StalenessPolicy::new(Duration::from_secs(300)),
            settings,
        );
        (orchestrator, bus, repo as Arc<dyn SyncAuditRepository>)
    }

    fn record_names(bus: &NotificationBus, names: &[&str]) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in names {
            let seen = Arc::clone(&seen);
            let label = name.to_string();
            bus.on(*name, move |_| {
                seen.lock().unwrap().push(label.clone());
                Ok(())
            });
        }
        seen
    }

    #[tokio::test]
    async fn drains_by_priority_then_insertion_order() {
        let handler = ScriptedHandler::new(true);
        let (orchestrator, _bus, _) = orchestrator(handler.clone(), SyncSettings::default()).await;

        orchestrator
            .queue_sync(EntityTable::Events, "first", json!({}), PRIORITY_DEFAULT)
            .await
            .unwrap();
        // 先頭タスクがハンドラー内で待機するまで待つ
        while orchestrator.queue_len() > 0 {
            tokio::task::yield_now().await;
        }
        for (op, priority) in [("a5", 5), ("b1", 1), ("c5", 5), ("d1", 1), ("e3", 3)] {
            orchestrator
                .queue_sync(EntityTable::Events, op, json!({}), priority)
                .await
                .unwrap();
        }
        let pending: Vec<String> = orchestrator
            .pending()
            .into_iter()
            .map(|t| t.operation)
            .collect();
        assert_eq!(pending, vec!["b1", "d1", "e3", "a5", "c5"]);

        handler.release();
        orchestrator.wait_idle().await;
        assert_eq!(handler.calls(), vec!["first", "b1", "d1", "e3", "a5", "c5"]);
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_queue() {
        let handler = ScriptedHandler::new(false);
        let (orchestrator, bus, audit) =
            orchestrator(handler.clone(), SyncSettings::default()).await;
        let seen = record_names(&bus, &[SYNC_STARTED, SYNC_ERROR, "events_synced", SYNC_PROGRESS]);

        orchestrator
            .queue_sync(EntityTable::Events, "explode", json!({}), PRIORITY_URGENT)
            .await
            .unwrap();
        orchestrator
            .queue_sync(EntityTable::Events, "ok", json!({}), PRIORITY_DEFAULT)
            .await
            .unwrap();
        orchestrator.wait_idle().await;

        assert_eq!(handler.calls(), vec!["explode", "ok"]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SYNC_STARTED,
                SYNC_ERROR,
                SYNC_PROGRESS,
                SYNC_STARTED,
                "events_synced",
                SYNC_PROGRESS
            ]
        );

        let status = orchestrator.status();
        assert_eq!(status.tasks.successes, 1);
        assert_eq!(status.tasks.failures, 1);
        assert!(status.last_error.unwrap().contains("bad id"));

        let statuses: Vec<SyncTaskStatus> = audit
            .recent_audit(10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.status)
            .collect();
        assert!(statuses.contains(&SyncTaskStatus::Failed));
        assert!(statuses.contains(&SyncTaskStatus::Completed));
    }

    #[tokio::test]
    async fn panicking_handler_is_reported_as_error() {
        let handler = ScriptedHandler::new(false);
        let (orchestrator, bus, _) = orchestrator(handler.clone(), SyncSettings::default()).await;
        let seen = record_names(&bus, &[SYNC_ERROR]);

        orchestrator
            .queue_sync(EntityTable::Users, "panic", json!({}), PRIORITY_DEFAULT)
            .await
            .unwrap();
        orchestrator
            .queue_sync(EntityTable::Users, "ok", json!({}), PRIORITY_DEFAULT)
            .await
            .unwrap();
        orchestrator.wait_idle().await;

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(handler.calls(), vec!["panic", "ok"]);
    }

    #[tokio::test]
    async fn hung_handler_times_out() {
        let handler = ScriptedHandler::new(false);
        let settings = SyncSettings {
            task_timeout: Some(Duration::from_millis(50)),
            ..SyncSettings::default()
        };
        let (orchestrator, _bus, _) = orchestrator(handler, settings).await;

        orchestrator
            .queue_sync(EntityTable::Events, "sleep", json!({}), PRIORITY_DEFAULT)
            .await
            .unwrap();
        orchestrator.wait_idle().await;

        let status = orchestrator.status();
        assert_eq!(status.tasks.failures, 1);
        assert!(status.last_error.unwrap().starts_with("Timed out"));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_when_enabled() {
        let handler = ScriptedHandler::new(false);
        let settings = SyncSettings {
            max_retries: 2,
            retry_backoff: Duration::from_millis(10),
            ..SyncSettings::default()
        };
        let (orchestrator, _bus, _) = orchestrator(handler.clone(), settings).await;

        orchestrator
            .queue_sync(EntityTable::Events, "flaky", json!({}), PRIORITY_DEFAULT)
            .await
            .unwrap();
        orchestrator.wait_idle().await;

        assert_eq!(handler.calls().len(), 3);
        assert_eq!(orchestrator.status().tasks.successes, 1);
    }

    #[tokio::test]
    async fn retries_are_off_by_default() {
        let handler = ScriptedHandler::new(false);
        let (orchestrator, _bus, _) = orchestrator(handler.clone(), SyncSettings::default()).await;

        orchestrator
            .queue_sync(EntityTable::Events, "flaky", json!({}), PRIORITY_DEFAULT)
            .await
            .unwrap();
        orchestrator.wait_idle().await;

        assert_eq!(handler.calls().len(), 1);
        assert_eq!(orchestrator.status().tasks.failures, 1);
    }

    #[tokio::test]
    async fn queue_sync_once_skips_identical_pending_work() {
        let handler = ScriptedHandler::new(true);
        let (orchestrator, _bus, _) = orchestrator(handler.clone(), SyncSettings::default()).await;

        orchestrator
            .queue_sync(EntityTable::Events, "blocker", json!({}), PRIORITY_URGENT)
            .await
            .unwrap();
        while orchestrator.queue_len() > 0 {
            tokio::task::yield_now().await;
        }

        let payload = json!({"event_id": 7});
        let first = orchestrator
            .queue_sync_once(EntityTable::Events, "fetch_one", payload.clone(), PRIORITY_URGENT)
            .await
            .unwrap();
        let second = orchestrator
            .queue_sync_once(EntityTable::Events, "fetch_one", payload, PRIORITY_URGENT)
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(orchestrator.queue_len(), 1);

        handler.release();
        orchestrator.wait_idle().await;
    }

    #[tokio::test]
    async fn empty_operation_is_rejected() {
        let handler = ScriptedHandler::new(false);
        let (orchestrator, _bus, _) = orchestrator(handler, SyncSettings::default()).await;
        let err = orchestrator
            .queue_sync(EntityTable::Events, "  ", json!({}), PRIORITY_DEFAULT)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn watchdog_restarts_a_stalled_queue() {
        let handler = ScriptedHandler::new(false);
        let settings = SyncSettings {
            watchdog_interval: Duration::from_millis(20),
            ..SyncSettings::default()
        };
        let (orchestrator, _bus, _) = orchestrator(handler.clone(), settings).await;

        orchestrator.push_stalled(SyncTask::new(
            EntityTable::Events,
            "stranded",
            json!({}),
            PRIORITY_DEFAULT,
        ));
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
        assert_eq!(orchestrator.queue_len(), 1);

        let watchdog = orchestrator.spawn_watchdog();
        tokio::time::timeout(Duration::from_secs(2), orchestrator.wait_idle())
            .await
            .expect("watchdog should drain the stalled queue");
        watchdog.abort();

        assert_eq!(handler.calls(), vec!["stranded"]);
        assert_eq!(orchestrator.queue_len(), 0);
        assert_eq!(orchestrator.status().tasks.successes, 1);
    }

    #[test]
    fn staleness_policy_boundaries() {
        let policy = StalenessPolicy::new(Duration::from_secs(300));
        assert!(policy.is_stale(None, 1_000));
        assert!(!policy.is_stale(Some(700), 1_000));
        assert!(policy.is_stale(Some(699), 1_000));
    }
}
