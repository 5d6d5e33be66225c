//! Profile key normalization and validation.
//!
//! Every key that leaves the matcher must be a member of the caller's current
//! key set. Candidates coming from the oracle or from a cache are checked by
//! exact equality first and then by normalized equality, in which case the
//! stored casing of the profile key is returned.

/// Lowercases and strips every non-alphanumeric character.
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Maps `candidate` onto the matching entry of `available`, or `None` when the
/// candidate does not name an available key.
pub fn match_available_key<'a, S: AsRef<str>>(
    candidate: &str,
    available: &'a [S],
) -> Option<&'a str> {
    if let Some(exact) = available.iter().find(|key| key.as_ref() == candidate) {
        return Some(exact.as_ref());
    }

    let wanted = normalize_key(candidate);
    if wanted.is_empty() {
        return None;
    }
    available
        .iter()
        .map(AsRef::as_ref)
        .find(|key| normalize_key(key) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators_and_case() {
        assert_eq!(normalize_key("E_Mail-Address "), "emailaddress");
        assert_eq!(normalize_key("  "), "");
    }

    #[test]
    fn exact_match_wins_over_normalized() {
        let keys = vec!["Email".to_string(), "email".to_string()];
        assert_eq!(match_available_key("email", &keys), Some("email"));
    }

    #[test]
    fn normalized_match_returns_stored_casing() {
        let keys = ["firstName", "phone"];
        assert_eq!(match_available_key("first_name", &keys), Some("firstName"));
        assert_eq!(match_available_key("e_mail", &["email"]), Some("email"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert_eq!(match_available_key("ssn", &["email"]), None);
        assert_eq!(match_available_key("__", &["email"]), None);
    }
}
