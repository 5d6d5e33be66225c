use crate::error::ConfigError;
use fieldmatch_cache::TierSettings;
use fieldmatch_remote::{OracleConfig, SharedCacheConfig};
use fieldmatch_signals::ChannelWeights;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_ORACLE_URL: &str = "FIELDMATCH_ORACLE_URL";
pub const ENV_SHARED_CACHE_URL: &str = "FIELDMATCH_SHARED_CACHE_URL";
pub const ENV_MIN_CONFIDENCE: &str = "FIELDMATCH_MIN_CONFIDENCE";

/// Full matcher configuration. Every section falls back to its defaults, so
/// an empty TOML document is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub heuristics: HeuristicsConfig,
    pub cache: CacheConfig,
    pub gate: GateConfig,
    pub oracle: OracleConfig,
    pub shared_cache: SharedCacheConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Scores strictly above this are used without consulting any other tier
    pub accept_threshold: f32,

    /// Scores below this only contribute possible matches
    pub fallback_threshold: f32,

    /// Per-channel reliability multipliers
    pub weights: ChannelWeights,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.7,
            fallback_threshold: 0.5,
            weights: ChannelWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Minimum confidence for a match to be written to any cache tier
    pub storage_threshold: u8,

    /// Maximum entries in the local field cache
    pub local_capacity: usize,

    /// Maximum forms in the batch cache
    pub batch_capacity: usize,

    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_threshold: 80,
            local_capacity: 500,
            batch_capacity: 50,
            ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn local_settings(&self) -> TierSettings {
        TierSettings {
            capacity: self.local_capacity,
            ttl: self.ttl(),
            min_confidence: self.storage_threshold,
        }
    }

    pub fn batch_settings(&self) -> TierSettings {
        TierSettings {
            capacity: self.batch_capacity,
            ttl: self.ttl(),
            min_confidence: self.storage_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum confidence to fill a field without asking
    pub min_confidence: u8,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { min_confidence: 75 }
    }
}

impl MatcherConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Applies `FIELDMATCH_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_empty(lookup(ENV_ORACLE_URL)) {
            self.oracle.endpoint = Some(url);
        }
        if let Some(url) = non_empty(lookup(ENV_SHARED_CACHE_URL)) {
            self.shared_cache.endpoint = Some(url);
        }
        if let Some(raw) = non_empty(lookup(ENV_MIN_CONFIDENCE)) {
            self.gate.min_confidence = raw.parse::<u8>().map_err(|_| {
                ConfigError::invalid(format!("{ENV_MIN_CONFIDENCE} must be 0-100, got {raw:?}"))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let heuristics = &self.heuristics;
        for (name, value) in [
            ("heuristics.accept_threshold", heuristics.accept_threshold),
            ("heuristics.fallback_threshold", heuristics.fallback_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if heuristics.fallback_threshold > heuristics.accept_threshold {
            return Err(ConfigError::invalid(format!(
                "heuristics.fallback_threshold ({}) exceeds accept_threshold ({})",
                heuristics.fallback_threshold, heuristics.accept_threshold
            )));
        }
        heuristics.weights.validate().map_err(ConfigError::invalid)?;

        if self.cache.storage_threshold > 100 {
            return Err(ConfigError::invalid("cache.storage_threshold must be 0-100"));
        }
        if self.gate.min_confidence > 100 {
            return Err(ConfigError::invalid("gate.min_confidence must be 0-100"));
        }
        if self.cache.local_capacity == 0 || self.cache.batch_capacity == 0 {
            return Err(ConfigError::invalid("cache capacities must be at least 1"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::invalid("cache.ttl_secs must be positive"));
        }
        if self.oracle.batch_size == 0 {
            return Err(ConfigError::invalid("oracle.batch_size must be at least 1"));
        }
        if self.oracle.deadline_ms == 0 || self.shared_cache.deadline_ms == 0 {
            return Err(ConfigError::invalid("remote deadlines must be positive"));
        }
        Ok(())
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(MatcherConfig::from_toml_str("").unwrap(), MatcherConfig::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = MatcherConfig::from_toml_str(
            r#"
            [oracle]
            endpoint = "https://oracle.example"
            batch_size = 3

            [heuristics.weights]
            proximity_text = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.oracle.batch_size, 3);
        assert_eq!(config.oracle.group_delay_ms, 300);
        assert_eq!(config.heuristics.weights.proximity_text, 0.2);
        assert_eq!(config.heuristics.weights.label, 1.0);
        assert_eq!(config.cache.storage_threshold, 80);
    }

    #[test]
    fn inconsistent_thresholds_are_rejected() {
        let err = MatcherConfig::from_toml_str(
            "[heuristics]\naccept_threshold = 0.4\nfallback_threshold = 0.6\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("fallback_threshold"));

        assert!(MatcherConfig::from_toml_str("[oracle]\nbatch_size = 0\n").is_err());
        assert!(MatcherConfig::from_toml_str("[gate]\nmin_confidence = 101\n").is_err());
    }

    #[test]
    fn environment_overrides_apply_and_validate() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_ORACLE_URL, "http://localhost:9000"),
            (ENV_SHARED_CACHE_URL, "  "),
            (ENV_MIN_CONFIDENCE, "90"),
        ]);
        let mut config = MatcherConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.oracle.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.shared_cache.endpoint, None);
        assert_eq!(config.gate.min_confidence, 90);

        let err = MatcherConfig::default()
            .apply_overrides(|name| (name == ENV_MIN_CONFIDENCE).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }
}
