pub mod content_service;
pub mod ledger_sync_handler;
pub mod notification_bus;
pub mod query_service;
pub mod sync_orchestrator;

pub use content_service::ContentService;
pub use ledger_sync_handler::LedgerSyncHandler;
pub use notification_bus::{NotificationBus, NotificationHandler, Subscription, SubscriptionId};
pub use query_service::{QueryService, SearchResults};
pub use sync_orchestrator::{
    OrchestratorState, StalenessPolicy, SyncOrchestrator, SyncSettings, SyncStatusSnapshot,
};
