use crate::config::SharedCacheConfig;
use crate::error::{RemoteError, Result};
use crate::guard::ServiceGuard;
use crate::transport::{Endpoint, JsonTransport};
use crate::validate::clamp_oracle_confidence;
use fieldmatch_protocol::shared::{
    SharedCacheHit, SharedCacheLookup, SharedCacheRequest, SharedCacheStore, SharedHitSource,
};
use fieldmatch_protocol::{FieldSignals, MAX_CONFIDENCE};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const NOT_FOUND: u16 = 404;

/// Context sent along with a lookup so the service can resolve a miss with
/// its own oracle call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedFieldContext {
    pub label: String,
    pub name: String,
    pub available_keys: Vec<String>,
    pub section_header: String,
    pub nearby_fields: Vec<String>,
    pub form_purpose: String,
}

impl SharedFieldContext {
    pub fn from_signals(signals: &FieldSignals, available_keys: &[String]) -> Self {
        Self {
            label: signals.label.clone(),
            name: signals.name.clone(),
            available_keys: available_keys.to_vec(),
            section_header: signals.section_header.clone(),
            nearby_fields: signals.nearby_field_labels.clone(),
            form_purpose: signals.form_purpose.clone(),
        }
    }
}

/// A hit from the shared tier, not yet validated against the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMatch {
    pub matched_key: String,
    pub confidence: u8,
    pub usage_count: u64,
    /// The service had no mapping and asked its own oracle.
    pub server_oracle: bool,
}

impl From<SharedCacheHit> for SharedMatch {
    fn from(hit: SharedCacheHit) -> Self {
        let server_oracle = hit.source == SharedHitSource::Oracle;
        // A server-side oracle answer is oracle output and gets its ceiling.
        let confidence = if server_oracle {
            clamp_oracle_confidence(hit.confidence)
        } else if hit.confidence.is_finite() {
            hit.confidence.round().clamp(0.0, f64::from(MAX_CONFIDENCE)) as u8
        } else {
            0
        };
        Self {
            matched_key: hit.matched_key,
            confidence,
            usage_count: hit.usage_count,
            server_oracle,
        }
    }
}

/// Client of the cross-user cache service.
pub struct SharedCacheClient {
    transport: Arc<dyn JsonTransport>,
    endpoint: Option<String>,
    min_store_confidence: u8,
    guard: ServiceGuard,
}

impl SharedCacheClient {
    pub fn new(
        transport: Arc<dyn JsonTransport>,
        config: &SharedCacheConfig,
        min_store_confidence: u8,
    ) -> Self {
        Self {
            transport,
            endpoint: config.endpoint.clone().filter(|url| !url.trim().is_empty()),
            min_store_confidence,
            guard: ServiceGuard::new(
                "shared cache",
                config.deadline(),
                config.unavailable_backoff(),
            ),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn guard(&self) -> &ServiceGuard {
        &self.guard
    }

    /// `Ok(None)` is a miss (404). Any other failure is an error the caller is
    /// expected to treat as a miss as well.
    pub async fn get(
        &self,
        signature: &str,
        context: Option<&SharedFieldContext>,
        credential: Option<&str>,
    ) -> Result<Option<SharedMatch>> {
        let base = self
            .endpoint
            .as_deref()
            .ok_or(RemoteError::NotConfigured("shared cache"))?;
        let endpoint = Endpoint::new(base).with_credential(credential);
        let request = SharedCacheRequest::Get(lookup(signature, context));
        let body = serde_json::to_value(&request)
            .map_err(|err| RemoteError::Malformed(format!("request not serializable: {err}")))?;

        self.guard
            .run(async {
                let response = self.transport.post_json(&endpoint, &body).await?;
                if response.status == NOT_FOUND {
                    return Ok(None);
                }
                if !response.is_success() {
                    return Err(RemoteError::Status {
                        status: response.status,
                        body: response.body,
                    });
                }
                let hit: SharedCacheHit = serde_json::from_str(&response.body)
                    .map_err(|err| RemoteError::Malformed(err.to_string()))?;
                Ok(Some(SharedMatch::from(hit)))
            })
            .await
    }

    /// Publishes a confirmed match without waiting for it. Matches below the
    /// storage threshold, or sent while the service is marked unavailable, are
    /// dropped here. The returned handle may be ignored.
    pub fn store(
        &self,
        signature: &str,
        matched_key: &str,
        confidence: u8,
        field_label: &str,
        field_name: &str,
        credential: Option<&str>,
    ) -> Option<JoinHandle<()>> {
        if confidence < self.min_store_confidence {
            log::debug!("shared cache: not publishing {signature} at confidence {confidence}");
            return None;
        }
        let base = self.endpoint.as_deref()?;
        if !self.guard.is_available() {
            return None;
        }

        let request = SharedCacheRequest::Store(SharedCacheStore {
            field_signature: signature.to_string(),
            matched_key: matched_key.to_string(),
            confidence,
            field_label: field_label.to_string(),
            field_name: field_name.to_string(),
        });
        let body = match serde_json::to_value(&request) {
            Ok(body) => body,
            Err(err) => {
                log::warn!("shared cache: store request not serializable: {err}");
                return None;
            }
        };
        let endpoint = Endpoint::new(base).with_credential(credential);
        let transport = Arc::clone(&self.transport);
        let deadline: Duration = self.guard.deadline();
        let signature = signature.to_string();

        Some(tokio::spawn(async move {
            match tokio::time::timeout(deadline, transport.post_json(&endpoint, &body)).await {
                Ok(Ok(response)) if response.is_success() => {
                    log::debug!("shared cache: stored {signature}");
                }
                Ok(Ok(response)) => {
                    log::debug!("shared cache: store of {signature} answered {}", response.status);
                }
                Ok(Err(err)) => log::debug!("shared cache: store of {signature} failed: {err}"),
                Err(_) => log::debug!("shared cache: store of {signature} timed out"),
            }
        }))
    }
}

fn lookup(signature: &str, context: Option<&SharedFieldContext>) -> SharedCacheLookup {
    let Some(context) = context else {
        return SharedCacheLookup {
            field_signature: signature.to_string(),
            ..SharedCacheLookup::default()
        };
    };
    let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
    SharedCacheLookup {
        field_signature: signature.to_string(),
        field_label: non_empty(&context.label),
        field_name: non_empty(&context.name),
        available_keys: Some(context.available_keys.clone()),
        section_header: non_empty(&context.section_header),
        nearby_fields: Some(context.nearby_fields.clone()),
        form_purpose: non_empty(&context.form_purpose),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_without_context_only_carries_the_signature() {
        let request = lookup("sig", None);
        assert_eq!(request.field_signature, "sig");
        assert!(!request.has_context());
    }

    #[test]
    fn lookup_with_context_omits_empty_strings() {
        let context = SharedFieldContext {
            label: "Email".into(),
            available_keys: vec!["email".into()],
            ..SharedFieldContext::default()
        };
        let request = lookup("sig", Some(&context));
        assert_eq!(request.field_label.as_deref(), Some("Email"));
        assert_eq!(request.field_name, None);
        assert!(request.has_context());
    }

    #[test]
    fn hit_confidence_is_clamped() {
        let cached = SharedMatch::from(SharedCacheHit {
            matched_key: "email".into(),
            confidence: 140.0,
            usage_count: 3,
            source: SharedHitSource::Cache,
        });
        assert_eq!(cached.confidence, 100);
        assert!(!cached.server_oracle);
    }

    #[test]
    fn server_oracle_hit_never_reaches_full_confidence() {
        for raw in [100.0, 140.0] {
            let matched = SharedMatch::from(SharedCacheHit {
                matched_key: "email".into(),
                confidence: raw,
                usage_count: 0,
                source: SharedHitSource::Oracle,
            });
            assert_eq!(matched.confidence, 98);
            assert!(matched.server_oracle);
        }
    }
}
