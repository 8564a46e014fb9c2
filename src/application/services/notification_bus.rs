use crate::domain::entities::Notification;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::broadcast;

const STREAM_CAPACITY: usize = 256;

pub type NotificationHandler = Arc<dyn Fn(&Notification) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    name: String,
    handler: NotificationHandler,
}

struct BusInner {
    handlers: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    stream: broadcast::Sender<Notification>,
}

impl BusInner {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = handlers.len();
        handlers.retain(|registration| registration.id != id);
        handlers.len() != before
    }
}

/// `on` の戻り値。`unsubscribe` で登録したハンドラーだけを解除する
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.remove(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner").finish_non_exhaustive()
    }
}

/// 名前付き通知の同期ディスパッチャー
///
/// ハンドラーは登録順に呼ばれる。ハンドラーのエラーや panic は記録され、残りのハンドラーは続行する。
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl NotificationBus {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                stream,
            }),
        }
    }

    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Registration {
            id,
            name: name.into(),
            handler: Arc::new(handler),
        };
        match self.inner.handlers.write() {
            Ok(mut handlers) => handlers.push(registration),
            Err(poisoned) => poisoned.into_inner().push(registration),
        }
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// 非同期の購読者向けに全通知を流す
    pub fn subscribe_stream(&self) -> broadcast::Receiver<Notification> {
        self.inner.stream.subscribe()
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.snapshot(name).len()
    }

    /// 呼び出したハンドラー数を返す
    pub fn emit(&self, name: &str, data: Value) -> usize {
        let notification = Notification::new(name, data);
        let handlers = self.snapshot(name);

        for (id, handler) in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&notification))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(
                        target: "bus",
                        event = name,
                        subscription = id.0,
                        error = %err,
                        "notification handler failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        target: "bus",
                        event = name,
                        subscription = id.0,
                        "notification handler panicked"
                    );
                }
            }
        }

        // 受信者がいない場合の送信エラーは無視
        let _ = self.inner.stream.send(notification);
        handlers.len()
    }

    // ロックを保持したままハンドラーを呼ばない（ハンドラー内で on/off できるように）
    fn snapshot(&self, name: &str) -> Vec<(SubscriptionId, NotificationHandler)> {
        let handlers = match self.inner.handlers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers
            .iter()
            .filter(|registration| registration.name == name)
            .map(|registration| (registration.id, Arc::clone(&registration.handler)))
            .collect()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
