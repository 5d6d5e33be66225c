//! Host-side services the coordinator reads from but never writes to.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde_json::Value;

pub const ENV_ORACLE_ENABLED: &str = "FIELDMATCH_ORACLE_ENABLED";
pub const ENV_ORACLE_KEY: &str = "FIELDMATCH_ORACLE_KEY";

/// The caller's profile. Its key set may change between any two calls.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn list_available_keys(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn oracle_enabled(&self) -> bool;
    async fn oracle_credential(&self) -> Option<String>;
}

/// A fixed key set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticProfile {
    keys: Vec<String>,
}

impl StaticProfile {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Keys of a profile document: every top-level field holding a usable
    /// value. Nulls, empty strings and empty containers are skipped.
    pub fn from_profile_json(profile: &Value) -> Result<Self> {
        let Value::Object(fields) = profile else {
            return Err(EngineError::Profile(
                "profile document must be a JSON object".to_string(),
            ));
        };
        let keys = fields
            .iter()
            .filter(|(_, value)| has_value(value))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[async_trait]
impl ProfileStore for StaticProfile {
    async fn list_available_keys(&self) -> Result<Vec<String>> {
        Ok(self.keys.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSettings {
    pub oracle_enabled: bool,
    pub oracle_credential: Option<String>,
}

#[async_trait]
impl SettingsStore for StaticSettings {
    async fn oracle_enabled(&self) -> bool {
        self.oracle_enabled
    }

    async fn oracle_credential(&self) -> Option<String> {
        self.oracle_credential.clone()
    }
}

/// Settings read from `FIELDMATCH_ORACLE_ENABLED` / `FIELDMATCH_ORACLE_KEY` on
/// every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

#[async_trait]
impl SettingsStore for EnvSettings {
    async fn oracle_enabled(&self) -> bool {
        parse_flag(std::env::var(ENV_ORACLE_ENABLED).ok().as_deref())
    }

    async fn oracle_credential(&self) -> Option<String> {
        std::env::var(ENV_ORACLE_KEY)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .map(str::to_ascii_lowercase)
        .is_some_and(|value| matches!(value.as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_keys_skip_empty_values() {
        let profile = StaticProfile::from_profile_json(&json!({
            "email": "ada@example.com",
            "phone": "",
            "middleName": null,
            "skills": [],
            "yearsExperience": 7,
            "linkedin": "https://linkedin.com/in/ada"
        }))
        .unwrap();
        let mut keys = profile.keys().to_vec();
        keys.sort();
        assert_eq!(keys, vec!["email", "linkedin", "yearsExperience"]);
    }

    #[test]
    fn non_object_profile_is_rejected() {
        assert!(StaticProfile::from_profile_json(&json!(["email"])).is_err());
    }

    #[test]
    fn flags() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some(" Yes ")));
        assert!(parse_flag(Some("on")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }
}
