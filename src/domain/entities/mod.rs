pub mod content;
pub mod enhanced;
pub mod event;
pub mod filters;
pub mod listing;
pub mod notification;
pub mod sync_task;
pub mod ticket;
pub mod user;

pub use content::{CachedContent, ContentCacheStats, ContentPayload};
pub use enhanced::{ContentLinked, Enhanced};
pub use event::Event;
pub use filters::{EventFilter, EventSort, ListingFilter, SearchScope};
pub use listing::MarketplaceListing;
pub use notification::Notification;
pub use sync_task::{
    PRIORITY_DEFAULT, PRIORITY_URGENT, SyncAuditRecord, SyncOutcome, SyncTask, SyncTaskStatus,
};
pub use ticket::{Ticket, ticket_key};
pub use user::User;
