pub mod cache;
pub mod content_network;
pub mod ledger_client;
pub mod repositories;
pub mod snapshot_store;
pub mod sync_task_handler;
