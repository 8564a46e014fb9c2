use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub contract_address: String,
    /// uint256（10進文字列）
    pub token_id: String,
    pub event_id: u64,
    pub owner: String,
    pub purchase_price: String,
    pub is_used: bool,
    pub is_listed: bool,
    pub metadata_uri: Option<String>,
    pub image_uri: Option<String>,
    pub last_synced: i64,
}

impl Ticket {
    /// 鮮度判定などで使う複合キー
    pub fn key(&self) -> String {
        ticket_key(&self.contract_address, &self.token_id)
    }
}

pub fn ticket_key(contract_address: &str, token_id: &str) -> String {
    format!("{contract_address}:{token_id}")
}
