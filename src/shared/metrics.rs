use crate::shared::unix_now;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// 0 は「未記録」
const NEVER: i64 = 0;

/// 同期タスクの完了・失敗回数と最終時刻（Unix 秒）
#[derive(Debug, Default)]
pub struct TaskCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    last_completed_at: AtomicI64,
    last_failed_at: AtomicI64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub successes: u64,
    pub failures: u64,
    pub last_success_at: Option<i64>,
    pub last_failure_at: Option<i64>,
}

impl TaskCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.last_completed_at.store(unix_now(), Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.last_failed_at.store(unix_now(), Ordering::Relaxed);
    }

    pub fn counts(&self) -> TaskCounts {
        let recorded = |at: &AtomicI64| match at.load(Ordering::Relaxed) {
            NEVER => None,
            ts => Some(ts),
        };
        TaskCounts {
            successes: self.completed.load(Ordering::Relaxed),
            failures: self.failed.load(Ordering::Relaxed),
            last_success_at: recorded(&self.last_completed_at),
            last_failure_at: recorded(&self.last_failed_at),
        }
    }
}
