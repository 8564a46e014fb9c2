use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSort {
    #[default]
    StartTimeAsc,
    StartTimeDesc,
    /// event_id の降順（新しく作成された順）
    Newest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub active_only: Option<bool>,
    pub organizer: Option<String>,
    pub starts_after: Option<i64>,
    pub starts_before: Option<i64>,
    /// 名前・説明・会場の部分一致
    pub text: Option<String>,
    #[serde(default)]
    pub sort: EventSort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub event_id: Option<u64>,
    pub seller: Option<String>,
    /// None の場合は有効な出品のみ
    pub include_inactive: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    All,
    Events,
    Users,
}
