pub mod cache_cleanup_job;

pub use cache_cleanup_job::{CacheCleanupJob, CacheCleanupRunStats};
