use crate::domain::entities::{Event, MarketplaceListing, Ticket, User};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 台帳への書き込み呼び出し
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerCall {
    pub method: String,
    pub args: Value,
    /// 送金額（wei）
    pub value_wei: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub emitted_events: Vec<EmittedEvent>,
}

impl TxReceipt {
    pub fn find_event(&self, name: &str) -> Option<&EmittedEvent> {
        self.emitted_events.iter().find(|event| event.name == name)
    }
}

/// 権威ある台帳へのアクセス
///
/// 返されるエンティティの `last_synced` は無視され、同期ハンドラーが打刻する。
/// リバートは `AppError::LedgerReverted`、到達不能は `AppError::Network` で返すこと。
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn event_count(&self) -> Result<u64, AppError>;

    async fn get_event(&self, event_id: u64) -> Result<Event, AppError>;

    async fn tickets_of(&self, owner: &str) -> Result<Vec<Ticket>, AppError>;

    async fn get_ticket(&self, contract_address: &str, token_id: &str)
        -> Result<Ticket, AppError>;

    async fn active_listings(&self) -> Result<Vec<MarketplaceListing>, AppError>;

    async fn get_user(&self, address: &str) -> Result<Option<User>, AppError>;

    async fn mutate(&self, call: LedgerCall) -> Result<TxReceipt, AppError>;
}
