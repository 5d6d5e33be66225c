use crate::config::{join_url, OracleConfig};
use crate::error::{RemoteError, Result};
use crate::guard::ServiceGuard;
use crate::transport::{Endpoint, JsonTransport};
use crate::validate::validate_verdict;
use fieldmatch_protocol::oracle::{
    OracleBatchField, OracleBatchRequest, OracleBatchResponse, OracleFieldRequest,
    OracleFieldResponse, OracleMapping,
};
use fieldmatch_protocol::{FieldSignals, MatchResult, MatchSource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const MATCH_PATH: &str = "match";
const BATCH_PATH: &str = "match/batch";

/// Per-index results of a batched call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Validated results of every field whose group was answered.
    pub results: BTreeMap<usize, MatchResult>,
    /// Fields whose group failed; they have no entry in `results`.
    pub failed_indices: Vec<usize>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_indices.is_empty()
    }
}

/// Client of the semantic-matching oracle.
///
/// Every answer is validated against the available keys before it leaves
/// this type. Batches go out in fixed-size groups with a pause in between.
pub struct MatchOracleClient {
    transport: Arc<dyn JsonTransport>,
    endpoint: Option<String>,
    batch_size: usize,
    group_delay: Duration,
    guard: ServiceGuard,
}

impl MatchOracleClient {
    pub fn new(transport: Arc<dyn JsonTransport>, config: &OracleConfig) -> Self {
        Self {
            transport,
            endpoint: config.endpoint.clone().filter(|url| !url.trim().is_empty()),
            batch_size: config.batch_size.max(1),
            group_delay: config.group_delay(),
            guard: ServiceGuard::new("oracle", config.deadline(), config.unavailable_backoff()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn guard(&self) -> &ServiceGuard {
        &self.guard
    }

    pub async fn match_one(
        &self,
        signals: &FieldSignals,
        available_keys: &[String],
        credential: Option<&str>,
    ) -> Result<MatchResult> {
        if available_keys.is_empty() {
            return Ok(MatchResult::unmatched());
        }
        let request = OracleFieldRequest::new(signals, available_keys);
        let response: OracleFieldResponse = self.post(MATCH_PATH, &request, credential).await?;
        let result = validate_verdict(
            response.matched_key,
            response.confidence,
            response.possible_matches,
            available_keys,
            false,
        );
        log::debug!(
            "oracle matched {:?} -> {:?} ({})",
            signals.display_label(),
            result.matched_key,
            result.confidence
        );
        Ok(result)
    }

    /// Resolves every field, `batch_size` at a time. A failed group is
    /// recorded in [`BatchOutcome::failed_indices`] and the remaining groups
    /// still go out; once the guard has opened they fail without a request.
    pub async fn match_batch(
        &self,
        fields: &[FieldSignals],
        available_keys: &[String],
        credential: Option<&str>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if fields.is_empty() {
            return outcome;
        }
        if available_keys.is_empty() {
            outcome.results = (0..fields.len())
                .map(|index| (index, MatchResult::unmatched()))
                .collect();
            return outcome;
        }

        let groups = fields.len().div_ceil(self.batch_size);
        for (group, chunk) in fields.chunks(self.batch_size).enumerate() {
            if group > 0 && !self.group_delay.is_zero() {
                tokio::time::sleep(self.group_delay).await;
            }
            let offset = group * self.batch_size;
            let indices: Vec<usize> = (offset..offset + chunk.len()).collect();

            match self
                .match_group(chunk, offset, available_keys, credential)
                .await
            {
                Ok(results) => {
                    log::debug!("oracle group {}/{groups} answered", group + 1);
                    outcome.results.extend(results);
                }
                Err(err) => {
                    log::warn!("oracle group {}/{groups} failed: {err}", group + 1);
                    outcome.failed_indices.extend(indices);
                }
            }
        }
        outcome
    }

    async fn match_group(
        &self,
        chunk: &[FieldSignals],
        offset: usize,
        available_keys: &[String],
        credential: Option<&str>,
    ) -> Result<BTreeMap<usize, MatchResult>> {
        let request = OracleBatchRequest {
            fields: chunk
                .iter()
                .enumerate()
                .map(|(pos, signals)| OracleBatchField::new(offset + pos, signals))
                .collect(),
            available_keys: available_keys.to_vec(),
        };
        let response: OracleBatchResponse = self.post(BATCH_PATH, &request, credential).await?;

        let range = offset..offset + chunk.len();
        let mut best: BTreeMap<usize, OracleMapping> = BTreeMap::new();
        for mapping in response.mappings {
            if !range.contains(&mapping.field_index) {
                log::warn!(
                    "oracle mapped index {} outside group {range:?}; ignoring",
                    mapping.field_index
                );
                continue;
            }
            let replace = best
                .get(&mapping.field_index)
                .map_or(true, |seen| mapping.confidence > seen.confidence);
            if replace {
                best.insert(mapping.field_index, mapping);
            }
        }

        // Fields the oracle left out were answered with "no match".
        let results = range
            .map(|index| {
                let result = match best.remove(&index) {
                    Some(mapping) => validate_verdict(
                        mapping.matched_key,
                        mapping.confidence,
                        mapping.possible_matches,
                        available_keys,
                        true,
                    ),
                    None => MatchResult {
                        source: MatchSource::Oracle { batched: true },
                        ..MatchResult::unmatched()
                    },
                };
                (index, result)
            })
            .collect();
        Ok(results)
    }

    async fn post<Req, Resp>(&self, path: &str, request: &Req, credential: Option<&str>) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let base = self
            .endpoint
            .as_deref()
            .ok_or(RemoteError::NotConfigured("oracle"))?;
        let endpoint = Endpoint::new(join_url(base, path)).with_credential(credential);
        let body = serde_json::to_value(request)
            .map_err(|err| RemoteError::Malformed(format!("request not serializable: {err}")))?;

        self.guard
            .run(async {
                let response = self.transport.post_json(&endpoint, &body).await?;
                if !response.is_success() {
                    return Err(RemoteError::Status {
                        status: response.status,
                        body: response.body,
                    });
                }
                serde_json::from_str::<Resp>(&response.body)
                    .map_err(|err| RemoteError::Malformed(err.to_string()))
            })
            .await
    }
}
