use serde::{Deserialize, Serialize};

/// 台帳上のイベントの非正規化射影
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: u64,
    pub organizer: String,
    pub name: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub start_time: i64,
    pub end_time: Option<i64>,
    /// wei（10進文字列）
    pub ticket_price: String,
    pub total_tickets: u64,
    pub tickets_sold: u64,
    pub is_active: bool,
    pub metadata_uri: Option<String>,
    pub image_uri: Option<String>,
    pub last_synced: i64,
}

impl Event {
    pub fn tickets_remaining(&self) -> u64 {
        self.total_tickets.saturating_sub(self.tickets_sold)
    }

    pub fn is_sold_out(&self) -> bool {
        self.tickets_remaining() == 0
    }
}
