use crate::application::ports::content_network::ContentNetwork;
use crate::domain::entities::ContentPayload;
use crate::domain::value_objects::{ContentHash, ContentKind};
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, multipart};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// HTTP ゲートウェイ1つ分のクライアント
///
/// 取得は `GET {base}/ipfs/{hash}`、公開は `POST {base}/api/v0/add`。
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            AppError::Configuration(format!("Failed to build HTTP client: {err}"))
        })?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn content_url(&self, hash: &ContentHash) -> String {
        hash.gateway_url(&self.base_url)
    }
}

#[async_trait]
impl ContentNetwork for HttpGateway {
    async fn publish(&self, payload: &ContentPayload) -> Result<ContentHash, AppError> {
        let (bytes, mime) = match payload {
            ContentPayload::Json(_) => (payload.to_bytes()?, "application/json"),
            ContentPayload::Binary(bytes) => (bytes.to_vec(), "application/octet-stream"),
        };
        let part = multipart::Part::bytes(bytes)
            .file_name("content")
            .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/v0/add", self.base_url))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "{} rejected publish with status {}",
                self.base_url,
                response.status()
            )));
        }

        let added: AddResponse = response.json().await?;
        ContentHash::new(added.hash).map_err(AppError::Network)
    }

    async fn fetch(
        &self,
        hash: &ContentHash,
        kind: ContentKind,
    ) -> Result<Option<ContentPayload>, AppError> {
        let response = self.client.get(self.content_url(hash)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => return Ok(None),
            status if !status.is_success() => {
                return Err(AppError::Network(format!(
                    "{} returned status {status} for {hash}",
                    self.base_url
                )));
            }
            _ => {}
        }

        let body = response.bytes().await?;
        Ok(Some(ContentPayload::from_bytes(kind, &body)?))
    }

    fn name(&self) -> &str {
        &self.base_url
    }
}
