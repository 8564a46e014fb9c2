use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    /// 台帳・コンテンツネットワークへの到達失敗（一時的）
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Ledger call reverted: {0}")]
    LedgerReverted(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported sync operation: {table}/{operation}")]
    UnsupportedOperation { table: String, operation: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    /// リトライ対象となる一時的な I/O 失敗かどうか
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Timeout(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<bincode::error::EncodeError> for AppError {
    fn from(err: bincode::error::EncodeError) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for AppError {
    fn from(err: bincode::error::DecodeError) -> Self {
        AppError::CorruptSnapshot(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
