pub mod ports;
pub mod services;

pub use services::{
    ContentService,
    LedgerSyncHandler,
    NotificationBus,
    QueryService,
    SyncOrchestrator,
};
