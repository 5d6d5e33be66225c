use fieldmatch_protocol::{MatchCandidate, MatchResult};
use std::collections::BTreeMap;

/// Per-field merge state of one resolution.
///
/// A later result replaces the current one only with strictly higher
/// confidence, so a field's confidence never goes down within a resolution.
/// The losing side is not thrown away: its key and candidates are folded into
/// the winner's possible matches.
#[derive(Debug, Clone, Default)]
pub struct ResolutionLedger {
    results: BTreeMap<usize, MatchResult>,
}

impl ResolutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `result` became the field's current result.
    pub fn offer(&mut self, index: usize, result: MatchResult) -> bool {
        match self.results.remove(&index) {
            None => {
                self.results.insert(index, result);
                true
            }
            Some(current) if result.confidence > current.confidence => {
                self.results.insert(index, absorb(result, current));
                true
            }
            Some(current) => {
                self.results.insert(index, absorb(current, result));
                false
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&MatchResult> {
        self.results.get(&index)
    }

    pub fn confidence(&self, index: usize) -> u8 {
        self.results.get(&index).map_or(0, |result| result.confidence)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn take(&mut self, index: usize) -> Option<MatchResult> {
        self.results.remove(&index)
    }

    /// Results for `0..count`; fields nobody answered read as unmatched.
    pub fn into_results(mut self, count: usize) -> BTreeMap<usize, MatchResult> {
        (0..count)
            .map(|index| {
                let result = self
                    .results
                    .remove(&index)
                    .unwrap_or_else(MatchResult::unmatched);
                (index, result)
            })
            .collect()
    }
}

fn absorb(mut winner: MatchResult, loser: MatchResult) -> MatchResult {
    let mut pool = std::mem::take(&mut winner.possible_matches);
    if let Some(key) = loser.matched_key {
        if loser.confidence > 0 {
            pool.push(MatchCandidate::new(key, loser.confidence));
        }
    }
    pool.extend(loser.possible_matches);

    let mut merged: Vec<MatchCandidate> = Vec::with_capacity(pool.len());
    for candidate in pool {
        if winner.matched_key.as_deref() == Some(candidate.key.as_str()) {
            continue;
        }
        match merged.iter_mut().find(|seen| seen.key == candidate.key) {
            Some(seen) if candidate.confidence > seen.confidence => *seen = candidate,
            Some(_) => {}
            None => merged.push(candidate),
        }
    }
    merged.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    winner.possible_matches = merged;
    winner
}
