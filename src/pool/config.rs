use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_derive::Deserialize;

use super::error::PoolError;

const DEFAULT_RECYCLE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct PoolConfig {
    pub max_size: usize,
    pub min_size: usize,
    /// Idle time after which a free connection is closed. `None` disables recycling.
    #[serde(rename = "recycle_seconds", deserialize_with = "recycle_seconds")]
    pub recycle: Option<Duration>,
    /// Deadline applied to every `acquire`. `None` waits indefinitely.
    #[serde(rename = "acquire_timeout_seconds", deserialize_with = "timeout_seconds")]
    pub acquire_timeout: Option<Duration>,
}

fn recycle_seconds<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(recycle_from_seconds(i64::deserialize(deserializer)?))
}

fn timeout_seconds<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64))
}

fn recycle_from_seconds(seconds: i64) -> Option<Duration> {
    u64::try_from(seconds).ok().map(Duration::from_secs)
}

impl PoolConfig {
    pub fn new(max_size: usize, min_size: usize) -> Self {
        Self {
            max_size,
            min_size,
            ..Default::default()
        }
    }

    pub fn with_recycle(mut self, recycle: Option<Duration>) -> Self {
        self.recycle = recycle;
        self
    }

    /// Negative values disable recycling.
    pub fn with_recycle_seconds(mut self, seconds: i64) -> Self {
        self.recycle = recycle_from_seconds(seconds);
        self
    }

    pub fn with_acquire_timeout(mut self, acquire_timeout: Option<Duration>) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), PoolError> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfig(
                "max_size must be at least 1".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(PoolError::InvalidConfig(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_size: 1,
            recycle: Some(DEFAULT_RECYCLE),
            acquire_timeout: None,
        }
    }
}
