pub mod cache_store;
pub mod params;
pub(crate) mod snapshot;
pub mod sqlite_repository;

pub use cache_store::{CacheStore, Statement};
pub use params::SqlValue;
pub use sqlite_repository::SqliteRepository;
