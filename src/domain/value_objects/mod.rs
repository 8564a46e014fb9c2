pub mod content_hash;
pub mod entity_table;
pub mod sync_task_id;

pub use content_hash::{ContentHash, ContentKind};
pub use entity_table::EntityTable;
pub use sync_task_id::SyncTaskId;
