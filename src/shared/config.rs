use crate::shared::validation::normalize_address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub content: ContentConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub contract_address: String,
    #[serde(default)]
    pub marketplace_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// 優先順に試行するゲートウェイ
    pub gateways: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub staleness_threshold_secs: u64,
    pub watchdog_interval_ms: u64,
    /// 0 でタイムアウト無効
    pub task_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub content_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub audit_retention_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// None の場合スナップショットはプロセス内メモリにのみ保持
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig {
                rpc_url: "http://127.0.0.1:8545".to_string(),
                contract_address: String::new(),
                marketplace_address: None,
            },
            content: ContentConfig {
                gateways: vec![
                    "https://ipfs.io".to_string(),
                    "https://cloudflare-ipfs.com".to_string(),
                    "https://gateway.pinata.cloud".to_string(),
                ],
                request_timeout_secs: 15,
            },
            sync: SyncConfig {
                staleness_threshold_secs: 300, // 5 minutes
                watchdog_interval_ms: 1_000,
                task_timeout_secs: 30,
                max_retries: 0,
                retry_backoff_ms: 500,
            },
            cache: CacheConfig {
                content_ttl_secs: 24 * 60 * 60,
                cleanup_interval_secs: 60 * 60,
                audit_retention_days: 7,
            },
            storage: StorageConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        if self.task_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.task_timeout_secs))
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl CacheConfig {
    pub fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("LEDGER_CACHE_RPC_URL") {
            cfg.ledger.rpc_url = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("LEDGER_CACHE_CONTRACT_ADDRESS") {
            cfg.ledger.contract_address = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("LEDGER_CACHE_MARKETPLACE_ADDRESS") {
            let v = v.trim();
            cfg.ledger.marketplace_address = if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            };
        }

        if let Ok(v) = std::env::var("LEDGER_CACHE_GATEWAYS") {
            let gateways: Vec<String> = v
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !gateways.is_empty() {
                cfg.content.gateways = gateways;
            }
        }
        if let Some(value) = env_u64("LEDGER_CACHE_REQUEST_TIMEOUT_SECS") {
            cfg.content.request_timeout_secs = value.max(1);
        }

        if let Some(value) = env_u64("LEDGER_CACHE_STALENESS_SECS") {
            cfg.sync.staleness_threshold_secs = value;
        }
        if let Some(value) = env_u64("LEDGER_CACHE_WATCHDOG_INTERVAL_MS") {
            cfg.sync.watchdog_interval_ms = value.max(1);
        }
        if let Some(value) = env_u64("LEDGER_CACHE_TASK_TIMEOUT_SECS") {
            cfg.sync.task_timeout_secs = value;
        }
        if let Some(value) = env_u64("LEDGER_CACHE_MAX_RETRIES") {
            cfg.sync.max_retries = value.min(u64::from(u32::MAX)) as u32;
        }
        if let Some(value) = env_u64("LEDGER_CACHE_RETRY_BACKOFF_MS") {
            cfg.sync.retry_backoff_ms = value;
        }

        if let Some(value) = env_u64("LEDGER_CACHE_CONTENT_TTL_SECS") {
            cfg.cache.content_ttl_secs = value.max(1);
        }
        if let Some(value) = env_u64("LEDGER_CACHE_CLEANUP_INTERVAL_SECS") {
            cfg.cache.cleanup_interval_secs = value.max(1);
        }
        if let Some(value) = env_u64("LEDGER_CACHE_AUDIT_RETENTION_DAYS") {
            cfg.cache.audit_retention_days = value;
        }

        if let Ok(v) = std::env::var("LEDGER_CACHE_SNAPSHOT_PATH") {
            let v = v.trim();
            cfg.storage.snapshot_path = if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            };
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ledger.contract_address.trim().is_empty() {
            return Err("Ledger contract_address is required".to_string());
        }
        normalize_address(&self.ledger.contract_address)
            .map_err(|e| format!("Ledger contract_address is invalid: {e}"))?;
        if let Some(marketplace) = &self.ledger.marketplace_address {
            normalize_address(marketplace)
                .map_err(|e| format!("Ledger marketplace_address is invalid: {e}"))?;
        }
        if self.content.gateways.is_empty() {
            return Err("At least one content gateway must be configured".to_string());
        }
        if self.content.request_timeout_secs == 0 {
            return Err("Content request_timeout_secs must be greater than 0".to_string());
        }
        if self.sync.watchdog_interval_ms == 0 {
            return Err("Sync watchdog_interval_ms must be greater than 0".to_string());
        }
        if self.cache.content_ttl_secs == 0 {
            return Err("Cache content_ttl_secs must be greater than 0".to_string());
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err("Cache cleanup_interval_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| parse_u64(&v))
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn default_config_requires_contract_address() {
        let cfg = AppConfig::default();
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("contract_address"));
    }

    #[test]
    fn default_intervals_match_reconciliation_policy() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.sync.staleness_threshold(), Duration::from_secs(300));
        assert_eq!(cfg.sync.watchdog_interval(), Duration::from_secs(1));
        assert_eq!(cfg.cache.content_ttl(), Duration::from_secs(86_400));
        assert_eq!(cfg.cache.cleanup_interval(), Duration::from_secs(3_600));
        assert_eq!(cfg.cache.audit_retention_days, 7);
        assert_eq!(cfg.sync.max_retries, 0);
    }

    #[test]
    fn validate_rejects_malformed_address_and_empty_gateways() {
        let mut cfg = AppConfig::default();
        cfg.ledger.contract_address = "0x1234".to_string();
        assert!(cfg.validate().is_err());

        cfg.ledger.contract_address = CONTRACT.to_string();
        assert!(cfg.validate().is_ok());

        cfg.content.gateways.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_task_timeout_disables_timeout() {
        let mut cfg = AppConfig::default();
        cfg.sync.task_timeout_secs = 0;
        assert!(cfg.sync.task_timeout().is_none());
        cfg.sync.task_timeout_secs = 5;
        assert_eq!(cfg.sync.task_timeout(), Some(Duration::from_secs(5)));
    }
}
