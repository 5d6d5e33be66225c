use crate::patterns::{Purpose, PurposePattern, PATTERNS};
use crate::text::split_tokens;
use fieldmatch_protocol::{FieldSignals, SignalChannel};
use serde::{Deserialize, Serialize};

const EXACT_STRENGTH: f32 = 1.0;
const PHRASE_STRENGTH: f32 = 0.8;
/// Single-word keywords shorter than this only match whole tokens, so `city`
/// never matches inside `ethnicity`.
const MIN_COMPACT_KEYWORD_LEN: usize = 5;

/// Reliability multiplier per channel. Label, autocomplete and the name
/// attribute are trusted most; text found near the field the least.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelWeights {
    pub label: f32,
    pub autocomplete: f32,
    pub name: f32,
    pub aria_label: f32,
    pub id: f32,
    pub placeholder: f32,
    pub proximity_text: f32,
}

impl Default for ChannelWeights {
    fn default() -> Self {
        Self {
            label: 1.0,
            autocomplete: 1.0,
            name: 0.9,
            aria_label: 0.85,
            id: 0.8,
            placeholder: 0.7,
            proximity_text: 0.4,
        }
    }
}

impl ChannelWeights {
    pub fn weight(&self, channel: SignalChannel) -> f32 {
        match channel {
            SignalChannel::Label => self.label,
            SignalChannel::Autocomplete => self.autocomplete,
            SignalChannel::Name => self.name,
            SignalChannel::AriaLabel => self.aria_label,
            SignalChannel::Id => self.id,
            SignalChannel::Placeholder => self.placeholder,
            SignalChannel::ProximityText => self.proximity_text,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for channel in SignalChannel::ALL {
            let weight = self.weight(channel);
            if !(0.0..=1.0).contains(&weight) {
                return Err(format!(
                    "channel weight for {} must be within [0, 1], got {weight}",
                    channel.as_str()
                ));
            }
        }
        Ok(())
    }
}

/// One ranked purpose for a field.
#[derive(Debug, Clone, PartialEq)]
pub struct PurposeScore {
    pub purpose: Purpose,
    /// Normalized to `[0, 1]`.
    pub score: f32,
    /// Channels that contributed, in channel priority order.
    pub channels: Vec<SignalChannel>,
}

impl PurposeScore {
    /// The score expressed on the 0-100 confidence scale.
    pub fn confidence(&self) -> u8 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = (self.score.clamp(0.0, 1.0) * 100.0).round() as u8;
        value
    }
}

struct ChannelText {
    channel: SignalChannel,
    tokens: Vec<String>,
    joined: String,
    compact: String,
}

impl ChannelText {
    fn new(channel: SignalChannel, raw: &str) -> Self {
        let tokens = if channel == SignalChannel::Autocomplete {
            raw.split_whitespace().map(str::to_ascii_lowercase).collect()
        } else {
            split_tokens(raw)
        };
        let joined = tokens.join(" ");
        let compact = tokens.concat();
        Self {
            channel,
            tokens,
            joined,
            compact,
        }
    }

    fn is_identifier_like(&self) -> bool {
        matches!(self.channel, SignalChannel::Name | SignalChannel::Id)
    }
}

/// Keyword-table scorer for field purposes.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    weights: ChannelWeights,
}

impl HeuristicScorer {
    pub fn new(weights: ChannelWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ChannelWeights {
        &self.weights
    }

    /// Ranks every purpose with a non-zero score, highest first. Identical
    /// input always yields the identical ranking.
    pub fn score(&self, signals: &FieldSignals) -> Vec<PurposeScore> {
        let channels: Vec<ChannelText> = SignalChannel::ALL
            .iter()
            .map(|&channel| ChannelText::new(channel, channel_text(signals, channel)))
            .filter(|text| !text.tokens.is_empty())
            .collect();
        let input_type = signals.input_type.trim().to_ascii_lowercase();

        let mut ranked: Vec<PurposeScore> = PATTERNS
            .iter()
            .filter_map(|pattern| self.score_purpose(pattern, &channels, &input_type))
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.purpose.cmp(&b.purpose))
        });

        if let Some(top) = ranked.first() {
            log::debug!(
                "heuristics: top purpose {} score={:.2} via {:?}",
                top.purpose,
                top.score,
                top.channels
            );
        }
        ranked
    }

    fn score_purpose(
        &self,
        pattern: &PurposePattern,
        channels: &[ChannelText],
        input_type: &str,
    ) -> Option<PurposeScore> {
        let mut total = 0.0f32;
        let mut hits = Vec::new();

        for text in channels {
            if pattern
                .excludes
                .iter()
                .any(|ex| text.tokens.iter().any(|t| t == ex))
            {
                continue;
            }
            let strength = if text.channel == SignalChannel::Autocomplete {
                autocomplete_strength(text, pattern)
            } else {
                pattern
                    .keywords
                    .iter()
                    .map(|kw| keyword_strength(text, kw))
                    .fold(0.0f32, f32::max)
            };
            if strength > 0.0 {
                total += self.weights.weight(text.channel) * strength;
                hits.push(text.channel);
            }
        }

        let score = (total.min(1.0) + input_type_bonus(pattern.purpose, input_type)).clamp(0.0, 1.0);
        if score <= 0.0 {
            return None;
        }
        Some(PurposeScore {
            purpose: pattern.purpose,
            score,
            channels: hits,
        })
    }
}

fn channel_text(signals: &FieldSignals, channel: SignalChannel) -> &str {
    match channel {
        SignalChannel::Label => &signals.label,
        SignalChannel::Name => &signals.name,
        SignalChannel::Id => &signals.id,
        SignalChannel::Placeholder => &signals.placeholder,
        SignalChannel::AriaLabel => &signals.aria_label,
        SignalChannel::Autocomplete => &signals.autocomplete,
        SignalChannel::ProximityText => &signals.proximity_text,
    }
}

fn keyword_strength(text: &ChannelText, keyword: &str) -> f32 {
    if text.joined == keyword {
        return EXACT_STRENGTH;
    }
    let kw_tokens: Vec<&str> = keyword.split(' ').collect();
    if contains_phrase(&text.tokens, &kw_tokens) {
        return PHRASE_STRENGTH;
    }
    if text.is_identifier_like() {
        let kw_compact = kw_tokens.concat();
        if text.compact == kw_compact {
            return EXACT_STRENGTH;
        }
        if (kw_tokens.len() > 1 || kw_compact.len() >= MIN_COMPACT_KEYWORD_LEN)
            && text.compact.contains(&kw_compact)
        {
            return PHRASE_STRENGTH;
        }
    }
    0.0
}

fn autocomplete_strength(text: &ChannelText, pattern: &PurposePattern) -> f32 {
    // "shipping email" and "section-billing tel" carry the purpose in one token.
    if text
        .tokens
        .iter()
        .any(|token| pattern.autocomplete.contains(&token.as_str()))
    {
        EXACT_STRENGTH
    } else {
        0.0
    }
}

fn contains_phrase(tokens: &[String], phrase: &[&str]) -> bool {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(phrase.len())
        .any(|window| window.iter().zip(phrase).all(|(t, p)| t == p))
}

fn input_type_bonus(purpose: Purpose, input_type: &str) -> f32 {
    match (purpose, input_type) {
        (Purpose::Email, "email") | (Purpose::Phone, "tel") => 0.3,
        (Purpose::Website, "url") => 0.2,
        (Purpose::DateOfBirth, "date") => 0.1,
        _ => 0.0,
    }
}
