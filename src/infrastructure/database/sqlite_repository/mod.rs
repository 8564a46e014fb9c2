use super::CacheStore;
use std::sync::Arc;

mod events;
mod listings;
mod mapper;
mod queries;
mod sync_audit;
mod sync_state;
mod tickets;
mod users;

/// キャッシュストア上のリポジトリ実装
#[derive(Clone)]
pub struct SqliteRepository {
    store: Arc<CacheStore>,
}

impl SqliteRepository {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }
}
