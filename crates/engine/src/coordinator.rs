use crate::collaborators::{ProfileStore, SettingsStore};
use crate::config::MatcherConfig;
use crate::error::Result;
use crate::gate::ConfidenceThresholdGate;
use crate::ledger::ResolutionLedger;
use fieldmatch_cache::{BatchCache, Clock, KeyValueStore, LocalCacheTier};
use fieldmatch_protocol::{
    match_available_key, FieldSignals, MatchCandidate, MatchResult, MatchSource,
};
use fieldmatch_remote::{JsonTransport, MatchOracleClient, SharedCacheClient, SharedFieldContext};
use fieldmatch_signals::{
    field_signature, form_signature, profile_signature, HeuristicScorer, PurposeResolver,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Everything the coordinator needs from its host.
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub transport: Arc<dyn JsonTransport>,
    pub settings: Arc<dyn SettingsStore>,
    pub profile: Arc<dyn ProfileStore>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub local_entries: usize,
    pub batch_entries: usize,
}

struct HeuristicVerdict {
    score: f32,
    result: MatchResult,
}

/// Runs the tiers in order and merges what they say.
///
/// ```text
/// heuristics ─(> accept)──────────────────────────────> result
///     │
///     └─> local cache ─> shared cache ─> oracle ─> merge ─> result
///                                          │
///                                          └─> write-through (≥ storage threshold)
/// ```
///
/// Nothing here returns an error: every failing tier degrades to the next
/// one, and total failure is an unmatched result.
pub struct MatchCoordinator {
    scorer: HeuristicScorer,
    resolver: Mutex<PurposeResolver>,
    accept_threshold: f32,
    fallback_threshold: f32,
    storage_threshold: u8,
    gate: ConfidenceThresholdGate,
    local: LocalCacheTier,
    batch_cache: BatchCache,
    shared: SharedCacheClient,
    oracle: MatchOracleClient,
    settings: Arc<dyn SettingsStore>,
    profile: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
}

impl MatchCoordinator {
    pub fn new(config: &MatcherConfig, parts: Collaborators) -> Result<Self> {
        config.validate()?;
        let storage_threshold = config.cache.storage_threshold;
        Ok(Self {
            scorer: HeuristicScorer::new(config.heuristics.weights),
            resolver: Mutex::new(PurposeResolver::new()),
            accept_threshold: config.heuristics.accept_threshold,
            fallback_threshold: config.heuristics.fallback_threshold,
            storage_threshold,
            gate: ConfidenceThresholdGate::new(config.gate.min_confidence),
            local: LocalCacheTier::new(
                parts.store.clone(),
                parts.clock.clone(),
                config.cache.local_settings(),
            ),
            batch_cache: BatchCache::new(
                parts.store,
                parts.clock.clone(),
                config.cache.batch_settings(),
            ),
            shared: SharedCacheClient::new(
                parts.transport.clone(),
                &config.shared_cache,
                storage_threshold,
            ),
            oracle: MatchOracleClient::new(parts.transport, &config.oracle),
            settings: parts.settings,
            profile: parts.profile,
            clock: parts.clock,
        })
    }

    pub fn gate(&self) -> ConfidenceThresholdGate {
        self.gate
    }

    pub fn oracle(&self) -> &MatchOracleClient {
        &self.oracle
    }

    pub fn shared_cache(&self) -> &SharedCacheClient {
        &self.shared
    }

    /// Resolves one field against `available_keys`. A returned key is always
    /// one of `available_keys`, in its stored casing.
    pub async fn resolve(&self, signals: &FieldSignals, available_keys: &[String]) -> MatchResult {
        let oracle_enabled = self.settings.oracle_enabled().await;
        let credential = self.settings.oracle_credential().await;
        self.resolve_with(signals, available_keys, oracle_enabled, credential.as_deref())
            .await
    }

    /// [`Self::resolve`] against the profile's current key set.
    pub async fn resolve_for_profile(&self, signals: &FieldSignals) -> MatchResult {
        match self.profile.list_available_keys().await {
            Ok(keys) => self.resolve(signals, &keys).await,
            Err(err) => {
                log::warn!("profile keys unavailable: {err}");
                MatchResult::unmatched()
            }
        }
    }

    /// Resolves a whole form. A repeat of the same fields, page path and key
    /// set within the cache lifetime is answered without any network call.
    pub async fn resolve_batch(
        &self,
        fields: &[FieldSignals],
        page_url: &str,
        available_keys: &[String],
    ) -> BTreeMap<usize, MatchResult> {
        if fields.is_empty() {
            return BTreeMap::new();
        }
        let oracle_enabled = self.settings.oracle_enabled().await;
        if available_keys.is_empty() || !oracle_enabled || !self.oracle.is_configured() {
            log::debug!(
                "batch: short-circuit (keys={}, oracle_enabled={oracle_enabled})",
                available_keys.len()
            );
            return ResolutionLedger::new().into_results(fields.len());
        }

        let form_sig = form_signature(fields, page_url, self.clock.now_ms());
        let profile_sig = profile_signature(available_keys);

        let field_sigs: Vec<String> = fields.iter().map(field_signature).collect();

        if let Some(entry) = self.batch_cache.get(&form_sig, &profile_sig).await {
            log::debug!("batch: cache hit for form {form_sig}");
            let mut ledger = ResolutionLedger::new();
            for (index, result) in entry.results_for(&field_sigs) {
                if index < fields.len() {
                    ledger.offer(index, result.revalidated(available_keys));
                }
            }
            return ledger.into_results(fields.len());
        }

        let credential = self.settings.oracle_credential().await;
        let credential = credential.as_deref();
        let outcome = self
            .oracle
            .match_batch(fields, available_keys, credential)
            .await;
        let complete = outcome.is_complete();

        let mut ledger = ResolutionLedger::new();
        for (index, result) in outcome.results {
            if let (Some(signals), Some(key)) = (fields.get(index), result.matched_key.as_deref()) {
                self.persist(&field_sigs[index], signals, key, result.confidence, credential)
                    .await;
            }
            ledger.offer(index, result);
        }

        if !complete {
            log::debug!(
                "batch: {} field(s) falling back to single resolution",
                outcome.failed_indices.len()
            );
        }
        for index in outcome.failed_indices {
            let Some(signals) = fields.get(index) else {
                continue;
            };
            let fallback = self
                .resolve_with(signals, available_keys, oracle_enabled, credential)
                .await;
            ledger.offer(index, fallback);
        }

        let results = ledger.into_results(fields.len());
        if complete {
            self.batch_cache
                .put(&form_sig, &profile_sig, field_sigs, results.clone())
                .await;
        }
        results
    }

    /// Drops every local mapping onto `key`. Batch entries need no sweep:
    /// a changed key set changes the profile signature.
    pub async fn invalidate_key(&self, key: &str) -> usize {
        self.local.invalidate_by_key(key).await
    }

    pub async fn clear_caches(&self) {
        self.local.clear().await;
        self.batch_cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            local_entries: self.local.len().await,
            batch_entries: self.batch_cache.len().await,
        }
    }

    async fn resolve_with(
        &self,
        signals: &FieldSignals,
        available_keys: &[String],
        oracle_enabled: bool,
        credential: Option<&str>,
    ) -> MatchResult {
        if available_keys.is_empty() {
            return MatchResult::unmatched();
        }

        let mut ledger = ResolutionLedger::new();
        if let Some(verdict) = self.heuristic(signals, available_keys) {
            if verdict.score > self.accept_threshold {
                log::debug!(
                    "resolve {:?}: heuristic accepted at {:.2}",
                    signals.display_label(),
                    verdict.score
                );
                return verdict.result;
            }
            if verdict.score >= self.fallback_threshold {
                ledger.offer(0, verdict.result);
            } else {
                ledger.offer(0, demote(verdict.result));
            }
        }

        self.consult_tiers(signals, available_keys, oracle_enabled, credential, &mut ledger)
            .await;
        ledger.take(0).unwrap_or_else(MatchResult::unmatched)
    }

    async fn consult_tiers(
        &self,
        signals: &FieldSignals,
        available_keys: &[String],
        oracle_enabled: bool,
        credential: Option<&str>,
        ledger: &mut ResolutionLedger,
    ) {
        let signature = field_signature(signals);

        if let Some(entry) = self.local.get(&signature).await {
            match match_available_key(&entry.matched_key, available_keys) {
                Some(key) => {
                    log::debug!("resolve {signature}: local cache hit -> {key}");
                    ledger.offer(
                        0,
                        MatchResult {
                            matched_key: Some(key.to_string()),
                            confidence: entry.confidence,
                            source: MatchSource::LocalCache {
                                signature: signature.clone(),
                                created_at_ms: entry.created_at,
                            },
                            possible_matches: Vec::new(),
                        },
                    );
                    return;
                }
                None => {
                    log::debug!(
                        "resolve {signature}: cached key {:?} no longer available",
                        entry.matched_key
                    );
                    self.local.remove(&signature).await;
                }
            }
        }

        if self.shared.is_configured() {
            // Context lets the service spend an oracle call on a miss, so it
            // is only sent when the caller allows oracle use.
            let context = oracle_enabled
                .then(|| SharedFieldContext::from_signals(signals, available_keys));
            match self.shared.get(&signature, context.as_ref(), credential).await {
                Ok(Some(hit)) => match match_available_key(&hit.matched_key, available_keys) {
                    Some(key) => {
                        log::debug!(
                            "resolve {signature}: shared cache hit -> {key} (used {}x)",
                            hit.usage_count
                        );
                        let accepted = ledger.offer(
                            0,
                            MatchResult {
                                matched_key: Some(key.to_string()),
                                confidence: hit.confidence,
                                source: MatchSource::SharedCache {
                                    signature: signature.clone(),
                                    usage_count: hit.usage_count,
                                    server_oracle: hit.server_oracle,
                                },
                                possible_matches: Vec::new(),
                            },
                        );
                        if accepted {
                            self.local.set(&signature, key, hit.confidence).await;
                        }
                        return;
                    }
                    None => log::debug!(
                        "resolve {signature}: shared key {:?} not available",
                        hit.matched_key
                    ),
                },
                Ok(None) => log::debug!("resolve {signature}: shared cache miss"),
                Err(err) => log::debug!("resolve {signature}: shared cache skipped: {err}"),
            }
        }

        if !oracle_enabled || !self.oracle.is_configured() {
            return;
        }
        match self
            .oracle
            .match_one(signals, available_keys, credential)
            .await
        {
            Ok(result) => {
                let confirmed = result
                    .matched_key
                    .clone()
                    .map(|key| (key, result.confidence));
                if ledger.offer(0, result) {
                    if let Some((key, confidence)) = confirmed {
                        self.persist(&signature, signals, &key, confidence, credential)
                            .await;
                    }
                }
            }
            Err(err) => log::warn!("resolve {signature}: oracle unavailable: {err}"),
        }
    }

    /// Write-through of a confirmed match. The local write is awaited, the
    /// shared one is not.
    async fn persist(
        &self,
        signature: &str,
        signals: &FieldSignals,
        key: &str,
        confidence: u8,
        credential: Option<&str>,
    ) {
        if confidence < self.storage_threshold {
            return;
        }
        self.local.set(signature, key, confidence).await;
        let _detached = self.shared.store(
            signature,
            key,
            confidence,
            &signals.label,
            &signals.name,
            credential,
        );
    }

    fn heuristic(&self, signals: &FieldSignals, available_keys: &[String]) -> Option<HeuristicVerdict> {
        let ranked = self.scorer.score(signals);
        let mut resolver = self.resolver.lock().unwrap_or_else(PoisonError::into_inner);

        let mut top = None;
        let mut candidates: Vec<MatchCandidate> = Vec::new();
        for scored in ranked {
            let Some(key) = resolver.resolve(scored.purpose, available_keys) else {
                continue;
            };
            if top.is_none() {
                top = Some((scored, key));
                continue;
            }
            let is_top = top.as_ref().is_some_and(|(_, top_key)| *top_key == key);
            if !is_top && !candidates.iter().any(|c| c.key == key) {
                candidates.push(MatchCandidate::new(key, scored.confidence()));
            }
        }

        let (best, key) = top?;
        Some(HeuristicVerdict {
            score: best.score,
            result: MatchResult {
                matched_key: Some(key),
                confidence: best.confidence(),
                source: MatchSource::Heuristic {
                    purpose: Some(best.purpose.as_str().to_string()),
                    channels: best.channels,
                },
                possible_matches: candidates,
            },
        })
    }
}

/// A weak heuristic guess is only a suggestion.
fn demote(mut result: MatchResult) -> MatchResult {
    if let Some(key) = result.matched_key.take() {
        result
            .possible_matches
            .insert(0, MatchCandidate::new(key, result.confidence));
    }
    result.confidence = 0;
    result
}
