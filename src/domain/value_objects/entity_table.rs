use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// 台帳から射影されるエンティティのテーブル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTable {
    Events,
    Tickets,
    MarketplaceListings,
    Users,
}

impl EntityTable {
    pub const ALL: [EntityTable; 4] = [
        EntityTable::Events,
        EntityTable::Tickets,
        EntityTable::MarketplaceListings,
        EntityTable::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityTable::Events => "events",
            EntityTable::Tickets => "tickets",
            EntityTable::MarketplaceListings => "marketplace_listings",
            EntityTable::Users => "users",
        }
    }
}

impl fmt::Display for EntityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "events" => Ok(EntityTable::Events),
            "tickets" => Ok(EntityTable::Tickets),
            "marketplace_listings" => Ok(EntityTable::MarketplaceListings),
            "users" => Ok(EntityTable::Users),
            other => Err(format!("Unknown entity table: {other}")),
        }
    }
}
