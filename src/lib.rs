pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::ports::content_network::ContentNetwork;
pub use application::ports::ledger_client::{EmittedEvent, LedgerCall, LedgerClient, TxReceipt};
pub use application::ports::snapshot_store::SnapshotStore;
pub use application::services::{SearchResults, Subscription, SyncStatusSnapshot};
pub use shared::{AppConfig, AppError, Result};
pub use state::AppState;

/// tracing の初期化。`RUST_LOG` が未設定なら `ledger_cache=debug,info`
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_cache=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
