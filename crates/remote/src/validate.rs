//! Nothing the oracle says is trusted as-is: keys must exist in the profile,
//! confidences are capped below certainty.

use fieldmatch_protocol::{match_available_key, MatchCandidate, MatchResult, MatchSource};
use fieldmatch_protocol::oracle::OracleCandidate;
use std::collections::HashMap;

/// Highest confidence an oracle answer can carry.
pub const ORACLE_CONFIDENCE_CEILING: u8 = 98;

/// Rounds and clamps a wire confidence into `0..=98`. Non-finite values read
/// as zero.
pub fn clamp_oracle_confidence(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, f64::from(ORACLE_CONFIDENCE_CEILING)) as u8
}

/// Validates every candidate, keeps the highest confidence per key and orders
/// the survivors by descending confidence (ties keep arrival order).
pub fn validate_candidates(
    candidates: Vec<OracleCandidate>,
    available_keys: &[String],
) -> Vec<MatchCandidate> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut validated: Vec<MatchCandidate> = Vec::new();

    for candidate in candidates {
        let Some(key) = match_available_key(&candidate.key, available_keys) else {
            log::debug!("dropping candidate {:?}: not an available key", candidate.key);
            continue;
        };
        let confidence = clamp_oracle_confidence(candidate.confidence);
        match slots.get(key) {
            Some(&slot) => {
                if confidence > validated[slot].confidence {
                    validated[slot].confidence = confidence;
                    validated[slot].reasoning = candidate.reasoning;
                }
            }
            None => {
                slots.insert(key.to_string(), validated.len());
                validated.push(MatchCandidate {
                    key: key.to_string(),
                    confidence,
                    reasoning: candidate.reasoning,
                });
            }
        }
    }

    validated.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    validated
}

/// Turns one raw oracle verdict into a [`MatchResult`]. A matched key that is
/// not available, even after normalization, is discarded and the field reads
/// as unmatched.
pub fn validate_verdict(
    matched_key: Option<String>,
    confidence: f64,
    possible_matches: Vec<OracleCandidate>,
    available_keys: &[String],
    batched: bool,
) -> MatchResult {
    let possible_matches = validate_candidates(possible_matches, available_keys);

    let matched = matched_key.as_deref().and_then(|raw| {
        let found = match_available_key(raw, available_keys);
        if found.is_none() {
            log::warn!("oracle returned unknown key {raw:?}; discarding");
        }
        found
    });

    match matched {
        Some(key) => MatchResult {
            matched_key: Some(key.to_string()),
            confidence: clamp_oracle_confidence(confidence),
            source: MatchSource::Oracle { batched },
            possible_matches,
        },
        None => MatchResult {
            matched_key: None,
            confidence: 0,
            source: MatchSource::Oracle { batched },
            possible_matches,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|key| key.to_string()).collect()
    }

    fn candidate(key: &str, confidence: f64) -> OracleCandidate {
        OracleCandidate {
            key: key.into(),
            confidence,
            reasoning: None,
        }
    }

    #[test]
    fn confidence_is_rounded_and_capped() {
        assert_eq!(clamp_oracle_confidence(100.0), 98);
        assert_eq!(clamp_oracle_confidence(97.6), 98);
        assert_eq!(clamp_oracle_confidence(81.4), 81);
        assert_eq!(clamp_oracle_confidence(-5.0), 0);
        assert_eq!(clamp_oracle_confidence(f64::NAN), 0);
    }

    #[test]
    fn normalized_key_is_promoted_to_stored_casing() {
        let result = validate_verdict(Some("e_mail".into()), 95.0, Vec::new(), &keys(&["email"]), false);
        assert_eq!(result.matched_key.as_deref(), Some("email"));
        assert_eq!(result.confidence, 95);

        let result = validate_verdict(Some("first name".into()), 90.0, Vec::new(), &keys(&["firstName"]), true);
        assert_eq!(result.matched_key.as_deref(), Some("firstName"));
        assert_eq!(result.source, MatchSource::Oracle { batched: true });
    }

    #[test]
    fn unknown_key_is_discarded() {
        let result = validate_verdict(Some("ssn".into()), 99.0, Vec::new(), &keys(&["email"]), false);
        assert_eq!(result.matched_key, None);
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn candidates_are_validated_deduped_and_sorted() {
        let validated = validate_candidates(
            vec![
                candidate("phone", 40.0),
                candidate("E-mail", 70.0),
                candidate("ssn", 99.0),
                candidate("email", 85.0),
                candidate("Phone", 20.0),
            ],
            &keys(&["email", "phone"]),
        );
        assert_eq!(
            validated,
            vec![MatchCandidate::new("email", 85), MatchCandidate::new("phone", 40)]
        );
    }
}
