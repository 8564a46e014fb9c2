pub mod content_cache;

pub use content_cache::SqliteContentCache;
