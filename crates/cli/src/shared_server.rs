//! In-memory implementation of the shared cache protocol, for development
//! and for exercising the client end to end.

use crate::http_api::{empty_response, error_response, json_response};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use fieldmatch_cache::unix_ms_now;
use fieldmatch_protocol::shared::{
    SharedCacheAck, SharedCacheHit, SharedCacheLookup, SharedCacheRequest, SharedCacheStore,
    SharedHitSource,
};
use fieldmatch_protocol::{match_available_key, FieldSignals, HealthStatus};
use fieldmatch_remote::MatchOracleClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub const SERVICE_NAME: &str = "fieldmatch-shared-cache";
pub const CACHE_ROUTE: &str = "/cache";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SharedRecord {
    matched_key: String,
    confidence: u8,
    usage_count: u64,
}

/// What a request resolved to, before it becomes an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub enum SharedReply {
    Hit(SharedCacheHit),
    Miss,
    Stored(SharedCacheAck),
}

pub struct SharedCacheService {
    records: Mutex<HashMap<String, SharedRecord>>,
    min_store_confidence: u8,
    oracle: Option<MatchOracleClient>,
    oracle_credential: Option<String>,
}

impl SharedCacheService {
    pub fn new(min_store_confidence: u8) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            min_store_confidence,
            oracle: None,
            oracle_credential: None,
        }
    }

    /// Resolves misses that carry field context with this oracle.
    pub fn with_oracle(mut self, oracle: MatchOracleClient, credential: Option<String>) -> Self {
        self.oracle = Some(oracle).filter(MatchOracleClient::is_configured);
        self.oracle_credential = credential;
        self
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn handle(&self, request: SharedCacheRequest) -> SharedReply {
        match request {
            SharedCacheRequest::Get(lookup) => {
                if let Some(hit) = self.lookup(&lookup.field_signature) {
                    return SharedReply::Hit(hit);
                }
                match self.resolve_miss(&lookup).await {
                    Some(hit) => SharedReply::Hit(hit),
                    None => SharedReply::Miss,
                }
            }
            SharedCacheRequest::Store(store) => SharedReply::Stored(SharedCacheAck {
                stored: self.store(store),
            }),
        }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, signature: &str) -> Option<SharedCacheHit> {
        let mut records = self.records();
        let record = records.get_mut(signature)?;
        record.usage_count += 1;
        Some(SharedCacheHit {
            matched_key: record.matched_key.clone(),
            confidence: f64::from(record.confidence),
            usage_count: record.usage_count,
            source: SharedHitSource::Cache,
        })
    }

    fn store(&self, store: SharedCacheStore) -> bool {
        if store.confidence < self.min_store_confidence {
            log::debug!(
                "refusing {} -> {} at confidence {}",
                store.field_signature,
                store.matched_key,
                store.confidence
            );
            return false;
        }
        log::debug!(
            "storing {} -> {} for {:?} ({:?})",
            store.field_signature,
            store.matched_key,
            store.field_label,
            store.field_name
        );
        let mut records = self.records();
        let usage_count = records
            .get(&store.field_signature)
            .map_or(0, |record| record.usage_count);
        records.insert(
            store.field_signature,
            SharedRecord {
                matched_key: store.matched_key,
                confidence: store.confidence,
                usage_count,
            },
        );
        true
    }

    async fn resolve_miss(&self, lookup: &SharedCacheLookup) -> Option<SharedCacheHit> {
        let oracle = self.oracle.as_ref()?;
        if !lookup.has_context() {
            return None;
        }
        let available = lookup.available_keys.clone().unwrap_or_default();
        let signals = FieldSignals {
            label: lookup.field_label.clone().unwrap_or_default(),
            name: lookup.field_name.clone().unwrap_or_default(),
            section_header: lookup.section_header.clone().unwrap_or_default(),
            nearby_field_labels: lookup.nearby_fields.clone().unwrap_or_default(),
            form_purpose: lookup.form_purpose.clone().unwrap_or_default(),
            ..FieldSignals::default()
        };

        let result = match oracle
            .match_one(&signals, &available, self.oracle_credential.as_deref())
            .await
        {
            Ok(result) => result,
            Err(err) => {
                log::warn!("server-side oracle failed for {}: {err}", lookup.field_signature);
                return None;
            }
        };
        let key = result.matched_key?;
        let key = match_available_key(&key, &available)?.to_string();

        let stored = self.store(SharedCacheStore {
            field_signature: lookup.field_signature.clone(),
            matched_key: key.clone(),
            confidence: result.confidence,
            field_label: signals.label,
            field_name: signals.name,
        });
        Some(SharedCacheHit {
            matched_key: key,
            confidence: f64::from(result.confidence),
            usage_count: u64::from(stored),
            source: SharedHitSource::Oracle,
        })
    }
}

pub fn router(service: Arc<SharedCacheService>) -> Router {
    Router::new()
        .route(CACHE_ROUTE, post(handle_cache).options(preflight))
        .route("/health", get(health).options(preflight))
        .with_state(service)
}

async fn handle_cache(
    State(service): State<Arc<SharedCacheService>>,
    body: Bytes,
) -> Result<Response, StatusCode> {
    let request: SharedCacheRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
        }
    };
    match service.handle(request).await {
        SharedReply::Hit(hit) => json_response(StatusCode::OK, &hit),
        SharedReply::Stored(ack) => json_response(StatusCode::OK, &ack),
        SharedReply::Miss => error_response(StatusCode::NOT_FOUND, "not_found", "no mapping"),
    }
}

async fn health() -> Result<Response, StatusCode> {
    json_response(
        StatusCode::OK,
        &HealthStatus {
            status: "ok".to_string(),
            service: SERVICE_NAME.to_string(),
            timestamp: unix_ms_now(),
        },
    )
}

async fn preflight() -> Result<Response, StatusCode> {
    empty_response(StatusCode::NO_CONTENT)
}
