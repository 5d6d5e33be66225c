//! Wire format of the semantic-matching oracle.

use crate::signals::FieldSignals;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OracleFieldRequest {
    pub label: String,
    pub name: String,
    pub placeholder: String,
    pub aria_label: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub section_header: String,
    pub nearby_fields: Vec<String>,
    pub form_purpose: String,
    pub available_keys: Vec<String>,
}

impl OracleFieldRequest {
    pub fn new(signals: &FieldSignals, available_keys: &[String]) -> Self {
        Self {
            label: signals.label.clone(),
            name: signals.name.clone(),
            placeholder: signals.placeholder.clone(),
            aria_label: signals.aria_label.clone(),
            input_type: signals.input_type.clone(),
            section_header: signals.section_header.clone(),
            nearby_fields: signals.nearby_field_labels.clone(),
            form_purpose: signals.form_purpose.clone(),
            available_keys: available_keys.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OracleBatchField {
    pub index: usize,
    pub label: String,
    pub name: String,
    pub placeholder: String,
    pub aria_label: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub section_header: String,
    pub nearby_fields: Vec<String>,
    pub form_purpose: String,
}

impl OracleBatchField {
    pub fn new(index: usize, signals: &FieldSignals) -> Self {
        Self {
            index,
            label: signals.label.clone(),
            name: signals.name.clone(),
            placeholder: signals.placeholder.clone(),
            aria_label: signals.aria_label.clone(),
            input_type: signals.input_type.clone(),
            section_header: signals.section_header.clone(),
            nearby_fields: signals.nearby_field_labels.clone(),
            form_purpose: signals.form_purpose.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OracleBatchRequest {
    pub fields: Vec<OracleBatchField>,
    pub available_keys: Vec<String>,
}

/// Candidate as sent by the oracle, before validation. Confidence may be any
/// JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OracleCandidate {
    pub key: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OracleFieldResponse {
    #[serde(default)]
    pub matched_key: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub possible_matches: Vec<OracleCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OracleMapping {
    pub field_index: usize,
    #[serde(default)]
    pub matched_key: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub possible_matches: Vec<OracleCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OracleBatchResponse {
    pub mappings: Vec<OracleMapping>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_request_uses_type_for_input_type() {
        let signals = FieldSignals {
            label: "Email".into(),
            input_type: "email".into(),
            ..FieldSignals::default()
        };
        let value =
            serde_json::to_value(OracleFieldRequest::new(&signals, &["email".to_string()]))
                .unwrap();
        assert_eq!(value["type"], "email");
        assert_eq!(value["availableKeys"][0], "email");
        assert!(value.get("inputType").is_none());
    }

    #[test]
    fn response_requires_confidence() {
        assert!(serde_json::from_str::<OracleFieldResponse>(r#"{"matchedKey":"email"}"#).is_err());
        let ok: OracleFieldResponse =
            serde_json::from_str(r#"{"matchedKey":null,"confidence":12.5}"#).unwrap();
        assert_eq!(ok.matched_key, None);
        assert!(ok.possible_matches.is_empty());
    }
}
