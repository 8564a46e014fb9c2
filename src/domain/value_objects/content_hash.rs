use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// コンテンツネットワーク上のアドレス（CID と任意のパス）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(value: String) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    /// `ipfs://<cid>`、`https://gw/ipfs/<cid>`、`/ipfs/<cid>`、素の CID を受け付ける
    pub fn from_uri(uri: &str) -> Result<Self, String> {
        let trimmed = uri.trim();
        let address = if let Some(rest) = trimmed.strip_prefix("ipfs://") {
            rest.strip_prefix("ipfs/").unwrap_or(rest)
        } else if let Some(index) = trimmed.find("/ipfs/") {
            &trimmed[index + "/ipfs/".len()..]
        } else if trimmed.contains("://") {
            return Err(format!("URI does not reference the content network: {trimmed}"));
        } else {
            trimmed
        };

        let address = address
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        Self::new(address.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{base}/ipfs/{hash}`
    pub fn gateway_url(&self, base_url: &str) -> String {
        format!("{}/ipfs/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// パスを除いたルート CID
    pub fn root(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Content hash cannot be empty".to_string());
        }
        let mut segments = value.split('/');
        let root = segments.next().unwrap_or_default();
        if root.is_empty() || !root.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("Content hash root must be alphanumeric: {value}"));
        }
        for segment in segments {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(format!("Content hash path is invalid: {value}"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(format!("Content hash path is invalid: {value}"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// JSON メタデータ
    Metadata,
    Binary,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Metadata => "metadata",
            ContentKind::Binary => "binary",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metadata" => Ok(ContentKind::Metadata),
            "binary" => Ok(ContentKind::Binary),
            other => Err(format!("Unknown content kind: {other}")),
        }
    }
}
