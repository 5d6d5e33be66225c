//! Wire format of the shared, multi-user cache service. A single endpoint
//! accepts requests tagged by `action`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SharedCacheRequest {
    Get(SharedCacheLookup),
    Store(SharedCacheStore),
}

/// A lookup. When the context fields are present the service may resolve a
/// miss with its own oracle call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SharedCacheLookup {
    pub field_signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearby_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_purpose: Option<String>,
}

impl SharedCacheLookup {
    pub fn has_context(&self) -> bool {
        self.available_keys
            .as_ref()
            .is_some_and(|keys| !keys.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SharedCacheStore {
    pub field_signature: String,
    pub matched_key: String,
    pub confidence: u8,
    #[serde(default)]
    pub field_label: String,
    #[serde(default)]
    pub field_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SharedHitSource {
    #[default]
    Cache,
    Oracle,
}

/// Body of a successful `get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SharedCacheHit {
    pub matched_key: String,
    pub confidence: f64,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub source: SharedHitSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SharedCacheAck {
    pub stored: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn requests_are_tagged_by_action() {
        let request = SharedCacheRequest::Get(SharedCacheLookup {
            field_signature: "k3x9".into(),
            ..SharedCacheLookup::default()
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["action"], "get");
        assert_eq!(value["fieldSignature"], "k3x9");
        assert!(value.get("availableKeys").is_none());

        let parsed: SharedCacheRequest = serde_json::from_str(
            r#"{"action":"store","fieldSignature":"a","matchedKey":"email","confidence":91}"#,
        )
        .unwrap();
        match parsed {
            SharedCacheRequest::Store(store) => {
                assert_eq!(store.matched_key, "email");
                assert_eq!(store.field_label, "");
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn hit_defaults_to_cache_source() {
        let hit: SharedCacheHit =
            serde_json::from_str(r#"{"matchedKey":"phone","confidence":88}"#).unwrap();
        assert_eq!(hit.source, SharedHitSource::Cache);
        assert_eq!(hit.usage_count, 0);
    }
}
