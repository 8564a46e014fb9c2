pub mod config;
pub mod error;
pub mod metrics;
pub mod validation;

pub use config::AppConfig;
pub use error::{AppError, Result};

/// Unix エポック秒
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
