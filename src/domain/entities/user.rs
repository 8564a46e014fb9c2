use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub address: String,
    pub display_name: Option<String>,
    pub avatar_uri: Option<String>,
    pub bio: Option<String>,
    pub tickets_owned: u64,
    pub events_organized: u64,
    pub last_synced: i64,
}
