use fieldmatch_protocol::{MatchCandidate, MatchResult};
use serde::{Deserialize, Serialize};

/// What the host should do with a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FillDecision {
    AutoFill { key: String },
    Suggest { candidates: Vec<MatchCandidate> },
    Skip,
}

/// Turns a result into a [`FillDecision`]. Pure; no I/O.
///
/// A matched key at or above `min_confidence` is filled. Otherwise every
/// candidate with non-zero confidence, the below-threshold key included, is
/// offered for manual choice, best first.
pub fn gate(result: &MatchResult, min_confidence: u8) -> FillDecision {
    if let Some(key) = &result.matched_key {
        if result.confidence >= min_confidence {
            return FillDecision::AutoFill { key: key.clone() };
        }
    }

    let mut candidates: Vec<MatchCandidate> = Vec::new();
    let below_threshold = result
        .matched_key
        .as_ref()
        .map(|key| MatchCandidate::new(key.clone(), result.confidence));
    for candidate in below_threshold
        .into_iter()
        .chain(result.possible_matches.iter().cloned())
    {
        if candidate.confidence == 0 {
            continue;
        }
        match candidates.iter_mut().find(|seen| seen.key == candidate.key) {
            Some(seen) if candidate.confidence > seen.confidence => *seen = candidate,
            Some(_) => {}
            None => candidates.push(candidate),
        }
    }
    candidates.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    if candidates.is_empty() {
        FillDecision::Skip
    } else {
        FillDecision::Suggest { candidates }
    }
}

/// [`gate`] with a fixed auto-fill threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceThresholdGate {
    min_confidence: u8,
}

impl ConfidenceThresholdGate {
    pub fn new(min_confidence: u8) -> Self {
        Self { min_confidence }
    }

    pub fn min_confidence(&self) -> u8 {
        self.min_confidence
    }

    pub fn decide(&self, result: &MatchResult) -> FillDecision {
        gate(result, self.min_confidence)
    }
}
