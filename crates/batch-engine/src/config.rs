//! Engine configuration
//!
//! All knobs are plain parameters. Nothing here reads the environment or a
//! file; callers deserialize [`EngineConfig`] from whatever source they own.

use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::pagination::PaginatorConfig;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Concurrency width must be at least one
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    /// Page size hint must be at least one
    #[error("page size must be at least 1")]
    ZeroPageSize,

    /// Retry policy allows no attempts at all
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// Backoff multiplier is below 1.0 or not a finite number
    #[error("backoff_coefficient must be a finite number >= 1.0, got {0}")]
    InvalidBackoffCoefficient(f64),

    /// Jitter factor outside 0.0-1.0
    #[error("jitter must be within 0.0..=1.0, got {0}")]
    InvalidJitter(f64),

    /// Admin address has no domain part
    #[error("invalid admin email: {0}")]
    InvalidAdminEmail(String),
}

/// Bundle of paginator and executor settings
///
/// # Example
///
/// ```
/// use batch_engine::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{
///     "batch": { "concurrency": 25, "retry": {
///         "initial_interval": 2000, "max_interval": 2000,
///         "backoff_coefficient": 1.0, "jitter": 0.0 } },
///     "pagination": { "page_size": 200, "quota_backoff": 3000 }
/// }"#).unwrap();
///
/// config.validate().unwrap();
/// assert_eq!(config.batch.concurrency, 25);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub pagination: PaginatorConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_pagination(mut self, pagination: PaginatorConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Reject values the builders would have clamped
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch.validate()?;
        if self.pagination.page_size == Some(0) {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(())
    }
}

/// Serde support for Duration as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
