use crate::patterns::Purpose;
use fieldmatch_protocol::normalize_key;
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32String};

/// Aliases shorter than this are only used for equality, never containment.
const MIN_CONTAINED_ALIAS_LEN: usize = 3;

/// Maps a heuristic purpose onto the caller's own key naming.
pub struct PurposeResolver {
    matcher: Matcher,
}

impl PurposeResolver {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
        }
    }

    /// Returns the available key holding values for `purpose`, if any.
    ///
    /// Keys equal to an alias after normalization win, in alias order.
    /// Otherwise keys containing an alias (`workEmail`, `mobilePhone`) are
    /// ranked by fuzzy score against the purpose name.
    pub fn resolve<S: AsRef<str>>(&mut self, purpose: Purpose, available: &[S]) -> Option<String> {
        let normalized: Vec<(String, &str)> = available
            .iter()
            .map(|key| (normalize_key(key.as_ref()), key.as_ref()))
            .collect();
        let aliases: Vec<String> = purpose.aliases().iter().map(|a| normalize_key(a)).collect();

        for alias in &aliases {
            if let Some((_, key)) = normalized.iter().find(|(norm, _)| norm == alias) {
                return Some((*key).to_string());
            }
        }

        let contained: Vec<&str> = normalized
            .iter()
            .filter(|(norm, _)| {
                aliases
                    .iter()
                    .any(|alias| alias.len() >= MIN_CONTAINED_ALIAS_LEN && norm.contains(alias.as_str()))
            })
            .map(|(_, key)| *key)
            .collect();

        match contained.len() {
            0 => None,
            1 => Some(contained[0].to_string()),
            _ => Some(self.rank(purpose, &contained).to_string()),
        }
    }

    fn rank<'a>(&mut self, purpose: Purpose, keys: &[&'a str]) -> &'a str {
        let query = purpose.as_str().replace('_', " ");
        let pattern = Pattern::parse(&query, CaseMatching::Ignore, Normalization::Smart);

        let mut best: Option<(u32, &'a str)> = None;
        for &key in keys {
            let haystack = Utf32String::from(key);
            let score = pattern.score(haystack.slice(..), &mut self.matcher).unwrap_or(0);
            let better = match best {
                None => true,
                Some((best_score, best_key)) => {
                    score > best_score
                        || (score == best_score
                            && (key.len(), key) < (best_key.len(), best_key))
                }
            };
            if better {
                best = Some((score, key));
            }
        }
        best.map_or(keys[0], |(_, key)| key)
    }
}

impl Default for PurposeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_equality_uses_stored_casing() {
        let mut resolver = PurposeResolver::new();
        let keys = ["FirstName", "email_address", "phone"];
        assert_eq!(
            resolver.resolve(Purpose::FirstName, &keys).as_deref(),
            Some("FirstName")
        );
        assert_eq!(
            resolver.resolve(Purpose::Email, &keys).as_deref(),
            Some("email_address")
        );
    }

    #[test]
    fn containment_falls_back_to_fuzzy_rank() {
        let mut resolver = PurposeResolver::new();
        let keys = ["workEmail", "mobilePhone"];
        assert_eq!(
            resolver.resolve(Purpose::Phone, &keys).as_deref(),
            Some("mobilePhone")
        );
        let several = ["personalEmail", "workEmail"];
        let picked = resolver.resolve(Purpose::Email, &several);
        assert!(picked.is_some());
        assert!(several.contains(&picked.unwrap().as_str()));
    }

    #[test]
    fn unrelated_keys_do_not_resolve() {
        let mut resolver = PurposeResolver::new();
        assert_eq!(resolver.resolve(Purpose::Github, &["email", "phone"]), None);
        let empty: [&str; 0] = [];
        assert_eq!(resolver.resolve(Purpose::Email, &empty), None);
    }
}
