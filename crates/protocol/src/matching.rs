use crate::keys::match_available_key;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound of every confidence value.
pub const MAX_CONFIDENCE: u8 = 100;

/// Field attribute a heuristic hit was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalChannel {
    Label,
    Name,
    Id,
    Placeholder,
    AriaLabel,
    Autocomplete,
    ProximityText,
}

impl SignalChannel {
    pub const ALL: [SignalChannel; 7] = [
        SignalChannel::Label,
        SignalChannel::Autocomplete,
        SignalChannel::Name,
        SignalChannel::AriaLabel,
        SignalChannel::Id,
        SignalChannel::Placeholder,
        SignalChannel::ProximityText,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Name => "name",
            Self::Id => "id",
            Self::Placeholder => "placeholder",
            Self::AriaLabel => "aria_label",
            Self::Autocomplete => "autocomplete",
            Self::ProximityText => "proximity_text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatchCandidate {
    pub key: String,
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl MatchCandidate {
    pub fn new(key: impl Into<String>, confidence: u8) -> Self {
        Self {
            key: key.into(),
            confidence: confidence.min(MAX_CONFIDENCE),
            reasoning: None,
        }
    }
}

/// Where a match came from. Each variant only carries what is meaningful for
/// that tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchSource {
    Heuristic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        purpose: Option<String>,
        #[serde(default)]
        channels: Vec<SignalChannel>,
    },
    LocalCache {
        signature: String,
        created_at_ms: u64,
    },
    SharedCache {
        signature: String,
        usage_count: u64,
        server_oracle: bool,
    },
    Oracle {
        batched: bool,
    },
}

impl MatchSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Heuristic { .. } => SourceKind::Heuristic,
            Self::LocalCache { .. } => SourceKind::LocalCache,
            Self::SharedCache { .. } => SourceKind::SharedCache,
            Self::Oracle { .. } => SourceKind::Oracle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Heuristic,
    LocalCache,
    SharedCache,
    Oracle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matched_key: Option<String>,
    pub confidence: u8,
    pub source: MatchSource,
    #[serde(default)]
    pub possible_matches: Vec<MatchCandidate>,
}

impl MatchResult {
    /// The result reported when nothing could be matched.
    pub fn unmatched() -> Self {
        Self {
            matched_key: None,
            confidence: 0,
            source: MatchSource::Heuristic {
                purpose: None,
                channels: Vec::new(),
            },
            possible_matches: Vec::new(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched_key.is_some()
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// Re-checks every key against the current profile key set. A matched key
    /// that is no longer available is dropped together with its confidence;
    /// unavailable candidates are removed.
    #[must_use]
    pub fn revalidated<S: AsRef<str>>(mut self, available: &[S]) -> Self {
        match self
            .matched_key
            .as_deref()
            .and_then(|key| match_available_key(key, available))
        {
            Some(key) => self.matched_key = Some(key.to_string()),
            None => {
                self.matched_key = None;
                self.confidence = 0;
            }
        }
        let mut candidates = Vec::with_capacity(self.possible_matches.len());
        for candidate in self.possible_matches {
            if let Some(key) = match_available_key(&candidate.key, available) {
                candidates.push(MatchCandidate {
                    key: key.to_string(),
                    ..candidate
                });
            }
        }
        self.possible_matches = candidates;
        self
    }
}
