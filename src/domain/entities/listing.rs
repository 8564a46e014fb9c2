use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceListing {
    pub listing_id: u64,
    pub contract_address: String,
    pub token_id: String,
    pub event_id: u64,
    pub seller: String,
    pub price: String,
    pub is_active: bool,
    pub listed_at: i64,
    pub last_synced: i64,
}
