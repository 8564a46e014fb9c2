use crate::application::ports::content_network::ContentNetwork;
use crate::domain::entities::ContentPayload;
use crate::domain::value_objects::{ContentHash, ContentKind};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;

/// 登録順にエンドポイントを試し、最初の成功を採用する
pub struct GatewayFailover {
    endpoints: Vec<Arc<dyn ContentNetwork>>,
}

impl GatewayFailover {
    pub fn new(endpoints: Vec<Arc<dyn ContentNetwork>>) -> Result<Self, AppError> {
        if endpoints.is_empty() {
            return Err(AppError::Configuration(
                "At least one content endpoint is required".to_string(),
            ));
        }
        Ok(Self { endpoints })
    }
}

fn aggregate(action: &str, failures: Vec<String>) -> AppError {
    AppError::Network(format!(
        "all {} content endpoints failed to {action}: {}",
        failures.len(),
        failures.join("; ")
    ))
}

#[async_trait]
impl ContentNetwork for GatewayFailover {
    async fn publish(&self, payload: &ContentPayload) -> Result<ContentHash, AppError> {
        let mut failures = Vec::new();
        for endpoint in &self.endpoints {
            match endpoint.publish(payload).await {
                Ok(hash) => return Ok(hash),
                Err(err) => {
                    tracing::warn!(
                        target: "cache::content",
                        endpoint = endpoint.name(),
                        error = %err,
                        "publish failed; trying next endpoint"
                    );
                    failures.push(format!("{}: {err}", endpoint.name()));
                }
            }
        }
        Err(aggregate("publish", failures))
    }

    async fn fetch(
        &self,
        hash: &ContentHash,
        kind: ContentKind,
    ) -> Result<Option<ContentPayload>, AppError> {
        let mut failures = Vec::new();
        let mut not_found = 0usize;
        for endpoint in &self.endpoints {
            match endpoint.fetch(hash, kind).await {
                Ok(Some(payload)) => return Ok(Some(payload)),
                Ok(None) => not_found += 1,
                Err(err) => {
                    tracing::debug!(
                        target: "cache::content",
                        endpoint = endpoint.name(),
                        hash = %hash,
                        error = %err,
                        "fetch failed; trying next endpoint"
                    );
                    failures.push(format!("{}: {err}", endpoint.name()));
                }
            }
        }

        // 1つでも「存在しない」と応答したエンドポイントがあれば未検出とみなす
        if not_found > 0 {
            Ok(None)
        } else {
            Err(aggregate("fetch", failures))
        }
    }

    fn name(&self) -> &str {
        "gateway-failover"
    }
}
