use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of the matching service. Single-field calls go to
    /// `<endpoint>/match`, batches to `<endpoint>/match/batch`.
    pub endpoint: Option<String>,
    pub batch_size: usize,
    pub group_delay_ms: u64,
    pub deadline_ms: u64,
    pub unavailable_backoff_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            batch_size: 5,
            group_delay_ms: 300,
            deadline_ms: 10_000,
            unavailable_backoff_secs: 60,
        }
    }
}

impl OracleConfig {
    pub fn group_delay(&self) -> Duration {
        Duration::from_millis(self.group_delay_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn unavailable_backoff(&self) -> Duration {
        Duration::from_secs(self.unavailable_backoff_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedCacheConfig {
    /// The single protocol endpoint; both `get` and `store` POST here.
    pub endpoint: Option<String>,
    pub deadline_ms: u64,
    pub unavailable_backoff_secs: u64,
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deadline_ms: 5_000,
            unavailable_backoff_secs: 30,
        }
    }
}

impl SharedCacheConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn unavailable_backoff(&self) -> Duration {
        Duration::from_secs(self.unavailable_backoff_secs)
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://o/", "/match"), "http://o/match");
        assert_eq!(join_url("http://o/api", "match/batch"), "http://o/api/match/batch");
    }
}
