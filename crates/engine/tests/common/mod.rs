#![allow(dead_code)]

use async_trait::async_trait;
use fieldmatch_cache::{KeyValueStore, ManualClock, MemoryStore};
use fieldmatch_engine::{
    Collaborators, MatchCoordinator, MatcherConfig, StaticProfile, StaticSettings,
};
use fieldmatch_remote::{Endpoint, JsonTransport, RemoteError, TransportResponse};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const ORACLE_URL: &str = "http://oracle.test";
pub const SHARED_URL: &str = "http://shared.test/cache";
pub const NOW_MS: u64 = 1_700_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    OracleOne,
    OracleBatch,
    SharedGet,
    SharedStore,
}

/// Stands in for the oracle and the shared cache. Replies are queued per
/// route; an empty oracle queue is an unreachable host, an empty shared
/// queue a miss. Stores are always acknowledged.
#[derive(Default)]
pub struct FakeServices {
    oracle_one: Mutex<VecDeque<(u16, Value)>>,
    oracle_batch: Mutex<VecDeque<(u16, Value)>>,
    shared_get: Mutex<VecDeque<(u16, Value)>>,
    calls: Mutex<Vec<(Route, Value)>>,
}

impl FakeServices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn oracle_replies(&self, status: u16, body: Value) {
        self.oracle_one.lock().unwrap().push_back((status, body));
    }

    pub fn batch_replies(&self, status: u16, body: Value) {
        self.oracle_batch.lock().unwrap().push_back((status, body));
    }

    pub fn shared_replies(&self, status: u16, body: Value) {
        self.shared_get.lock().unwrap().push_back((status, body));
    }

    pub fn calls(&self, route: Route) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(seen, _)| *seen == route)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn oracle_calls(&self) -> usize {
        self.calls(Route::OracleOne).len() + self.calls(Route::OracleBatch).len()
    }
}

#[async_trait]
impl JsonTransport for FakeServices {
    async fn post_json(
        &self,
        endpoint: &Endpoint,
        body: &Value,
    ) -> fieldmatch_remote::Result<TransportResponse> {
        let route = if endpoint.url.ends_with("/match/batch") {
            Route::OracleBatch
        } else if endpoint.url.ends_with("/match") {
            Route::OracleOne
        } else if body["action"] == "store" {
            Route::SharedStore
        } else {
            Route::SharedGet
        };
        self.calls.lock().unwrap().push((route, body.clone()));

        let reply = match route {
            Route::OracleOne => self.oracle_one.lock().unwrap().pop_front(),
            Route::OracleBatch => self.oracle_batch.lock().unwrap().pop_front(),
            Route::SharedGet => Some(
                self.shared_get
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or((404, json!({"error": "not found"}))),
            ),
            Route::SharedStore => Some((200, json!({"stored": true}))),
        };
        match reply {
            Some((status, body)) => Ok(TransportResponse {
                status,
                body: body.to_string(),
            }),
            None => Err(RemoteError::Network("connection refused".into())),
        }
    }
}

pub struct Harness {
    pub coordinator: MatchCoordinator,
    pub services: Arc<FakeServices>,
    pub clock: Arc<ManualClock>,
}

pub fn config(oracle: bool, shared: bool) -> MatcherConfig {
    let mut config = MatcherConfig::default();
    if oracle {
        config.oracle.endpoint = Some(ORACLE_URL.into());
    }
    if shared {
        config.shared_cache.endpoint = Some(SHARED_URL.into());
    }
    config
}

pub fn harness(config: MatcherConfig, oracle_enabled: bool) -> Harness {
    harness_with_store(config, oracle_enabled, Arc::new(MemoryStore::new()))
}

pub fn harness_with_store(
    config: MatcherConfig,
    oracle_enabled: bool,
    store: Arc<dyn KeyValueStore>,
) -> Harness {
    let services = FakeServices::new();
    let clock = Arc::new(ManualClock::new(NOW_MS));
    let coordinator = MatchCoordinator::new(
        &config,
        Collaborators {
            store,
            clock: clock.clone(),
            transport: services.clone(),
            settings: Arc::new(StaticSettings {
                oracle_enabled,
                oracle_credential: Some("test-key".into()),
            }),
            profile: Arc::new(StaticProfile::new(["email", "phone", "firstName"])),
        },
    )
    .expect("valid config");
    Harness {
        coordinator,
        services,
        clock,
    }
}

pub fn keys(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|key| key.to_string()).collect()
}
