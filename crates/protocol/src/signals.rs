use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Text and metadata describing one form field, produced once per detection
/// pass. Absent signals are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSignals {
    pub label: String,
    pub name: String,
    pub id: String,
    pub placeholder: String,
    pub aria_label: String,
    pub autocomplete: String,
    pub parent_text: String,
    pub proximity_text: String,
    pub input_type: String,
    pub section_header: String,
    pub nearby_field_labels: Vec<String>,
    pub form_purpose: String,
}

impl FieldSignals {
    /// Shorthand used by hosts and tests that only know the visible label.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// True when no text channel carries anything to match on.
    pub fn is_blank(&self) -> bool {
        [
            &self.label,
            &self.name,
            &self.id,
            &self.placeholder,
            &self.aria_label,
            &self.autocomplete,
            &self.proximity_text,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }

    /// Best human-readable description, used when a single label is needed.
    pub fn display_label(&self) -> &str {
        [&self.label, &self.aria_label, &self.placeholder, &self.name]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_partial_camel_case_payload() {
        let signals: FieldSignals = serde_json::from_str(
            r#"{"label":"Email Address","ariaLabel":"email","nearbyFieldLabels":["Phone"]}"#,
        )
        .unwrap();
        assert_eq!(signals.label, "Email Address");
        assert_eq!(signals.aria_label, "email");
        assert_eq!(signals.nearby_field_labels, vec!["Phone".to_string()]);
        assert_eq!(signals.input_type, "");
    }

    #[test]
    fn display_label_falls_back_through_channels() {
        let signals = FieldSignals {
            placeholder: "you@example.com".into(),
            name: "email".into(),
            ..FieldSignals::default()
        };
        assert_eq!(signals.display_label(), "you@example.com");
        assert!(FieldSignals::default().is_blank());
        assert!(!signals.is_blank());
    }
}
