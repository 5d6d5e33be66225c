use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));

/// Collapses whitespace and strips required-field markers (`*`) and trailing
/// colons that labels usually carry.
pub fn clean_text(raw: &str) -> String {
    let collapsed = WHITESPACE.replace_all(raw, " ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || c == '*' || c == ':')
        .to_string()
}

/// Cuts `text` to at most `max` grapheme clusters.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    text.graphemes(true).take(max).collect::<String>().trim_end().to_string()
}

/// Lowercase word tokens. `firstName`, `first_name` and `First Name` all give
/// `["first", "name"]`.
pub fn split_tokens(text: &str) -> Vec<String> {
    let spaced = CAMEL_BOUNDARY.replace_all(text, "$1 $2");
    spaced
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_text_strips_markers() {
        assert_eq!(clean_text("  Email\n  Address *: "), "Email Address");
        assert_eq!(clean_text("*Phone"), "Phone");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn tokens_split_identifiers() {
        assert_eq!(split_tokens("firstName"), vec!["first", "name"]);
        assert_eq!(split_tokens("billing_zip-code"), vec!["billing", "zip", "code"]);
        assert_eq!(split_tokens("Address Line 2"), vec!["address", "line", "2"]);
    }

    #[test]
    fn truncation_respects_graphemes() {
        assert_eq!(truncate_graphemes("héllo wörld", 5), "héllo");
        assert_eq!(truncate_graphemes("short", 80), "short");
    }
}
