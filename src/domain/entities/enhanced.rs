use super::{Event, Ticket, User};
use serde::Serialize;
use serde_json::Value;

/// コンテンツネットワーク由来の情報をマージした読み取り結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enhanced<T> {
    #[serde(flatten)]
    pub record: T,
    pub metadata: Option<Value>,
    pub image_url: Option<String>,
}

impl<T> Enhanced<T> {
    pub fn bare(record: T) -> Self {
        Self {
            record,
            metadata: None,
            image_url: None,
        }
    }
}

/// メタデータ・画像 URI を持つ行
pub trait ContentLinked {
    fn metadata_uri(&self) -> Option<&str>;
    fn image_uri(&self) -> Option<&str>;
}

impl ContentLinked for Event {
    fn metadata_uri(&self) -> Option<&str> {
        self.metadata_uri.as_deref()
    }

    fn image_uri(&self) -> Option<&str> {
        self.image_uri.as_deref()
    }
}

impl ContentLinked for Ticket {
    fn metadata_uri(&self) -> Option<&str> {
        self.metadata_uri.as_deref()
    }

    fn image_uri(&self) -> Option<&str> {
        self.image_uri.as_deref()
    }
}

impl ContentLinked for User {
    fn metadata_uri(&self) -> Option<&str> {
        None
    }

    fn image_uri(&self) -> Option<&str> {
        self.avatar_uri.as_deref()
    }
}
