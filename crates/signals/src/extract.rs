use crate::text::{clean_text, split_tokens, truncate_graphemes};
use fieldmatch_protocol::FieldSignals;
use serde::{Deserialize, Serialize};

const MAX_LABEL_GRAPHEMES: usize = 80;
const MAX_CONTEXT_GRAPHEMES: usize = 120;
const MAX_NEARBY_LABELS: usize = 6;

/// Form purposes, checked in order. The first table entry with a keyword in
/// the form's identifying text wins.
const FORM_PURPOSES: &[(&str, &[&str])] = &[
    ("login", &["login", "log in", "signin", "sign in"]),
    (
        "signup",
        &["signup", "sign up", "register", "registration", "create account"],
    ),
    (
        "job_application",
        &["apply", "application", "career", "careers", "job", "resume", "candidate"],
    ),
    ("checkout", &["checkout", "payment", "order", "purchase"]),
    ("shipping", &["shipping", "delivery"]),
    ("billing", &["billing", "invoice"]),
    ("newsletter", &["newsletter", "subscribe", "subscription"]),
    ("contact", &["contact", "enquiry", "inquiry", "message", "support"]),
    ("profile", &["profile", "account", "settings"]),
];

/// A form control as reported by the DOM scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectedField {
    pub id: String,
    pub name: String,
    /// `input`, `select` or `textarea`.
    pub tag: String,
    pub input_type: String,
    pub placeholder: String,
    pub aria_label: String,
    pub autocomplete: String,
    /// Text of a `<label for=...>` pointing at the control.
    pub explicit_label: String,
    /// Text of a `<label>` wrapping the control.
    pub wrapping_label: String,
    /// Text of the elements named by `aria-labelledby`.
    pub labelled_by_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormContext {
    pub id: String,
    pub name: String,
    pub action: String,
    pub heading: String,
    pub submit_text: String,
}

/// What the DOM scan saw around a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomContext {
    pub parent_text: String,
    /// Text immediately preceding the control.
    pub preceding_text: String,
    /// Enclosing headers, nearest first.
    pub section_headers: Vec<String>,
    /// Labels of the other fields of the form, in DOM order.
    pub nearby_labels: Vec<String>,
    pub form: FormContext,
}

/// Turns a detected field and its surroundings into [`FieldSignals`].
/// Pure: no I/O and no failure mode, missing signals become empty strings.
#[derive(Debug, Clone)]
pub struct SignalExtractor {
    max_label: usize,
    max_context: usize,
    max_nearby: usize,
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self {
            max_label: MAX_LABEL_GRAPHEMES,
            max_context: MAX_CONTEXT_GRAPHEMES,
            max_nearby: MAX_NEARBY_LABELS,
        }
    }
}

impl SignalExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&self, field: &DetectedField, context: &DomContext) -> FieldSignals {
        let label = [
            &field.explicit_label,
            &field.wrapping_label,
            &field.labelled_by_text,
        ]
        .into_iter()
        .map(|raw| clean_text(raw))
        .find(|text| !text.is_empty())
        .map(|text| truncate_graphemes(&text, self.max_label))
        .unwrap_or_default();

        let section_header = context
            .section_headers
            .iter()
            .map(|raw| clean_text(raw))
            .find(|text| !text.is_empty())
            .map(|text| truncate_graphemes(&text, self.max_label))
            .unwrap_or_default();

        let own_label = label.to_lowercase();
        let nearby_field_labels = context
            .nearby_labels
            .iter()
            .map(|raw| truncate_graphemes(&clean_text(raw), self.max_label))
            .filter(|text| !text.is_empty() && text.to_lowercase() != own_label)
            .take(self.max_nearby)
            .collect();

        FieldSignals {
            label,
            name: field.name.trim().to_string(),
            id: field.id.trim().to_string(),
            placeholder: truncate_graphemes(&clean_text(&field.placeholder), self.max_label),
            aria_label: truncate_graphemes(&clean_text(&field.aria_label), self.max_label),
            autocomplete: field.autocomplete.trim().to_ascii_lowercase(),
            parent_text: truncate_graphemes(&clean_text(&context.parent_text), self.max_context),
            proximity_text: truncate_graphemes(
                &clean_text(&context.preceding_text),
                self.max_context,
            ),
            input_type: input_type(field),
            section_header,
            nearby_field_labels,
            form_purpose: infer_form_purpose(&context.form),
        }
    }
}

fn input_type(field: &DetectedField) -> String {
    let tag = field.tag.trim().to_ascii_lowercase();
    if tag == "select" || tag == "textarea" {
        return tag;
    }
    let ty = field.input_type.trim().to_ascii_lowercase();
    if ty.is_empty() {
        "text".to_string()
    } else {
        ty
    }
}

/// Best guess at what the whole form is for, or an empty string.
pub fn infer_form_purpose(form: &FormContext) -> String {
    let tokens: Vec<String> = [
        &form.id,
        &form.name,
        &form.action,
        &form.heading,
        &form.submit_text,
    ]
    .into_iter()
    .flat_map(|raw| split_tokens(raw))
    .collect();
    if tokens.is_empty() {
        return String::new();
    }
    let haystack = format!(" {} ", tokens.join(" "));

    FORM_PURPOSES
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|kw| haystack.contains(&format!(" {kw} ")))
        })
        .map(|(purpose, _)| (*purpose).to_string())
        .unwrap_or_default()
}
