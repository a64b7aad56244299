//! Suggestion domain model.
//!
//! # Responsibility
//! - Define the canonical suggestion record held by the store.
//! - Map fine-grained suggestion kinds onto sidebar categories.
//! - Provide char-offset range helpers over the plain-text projection.
//!
//! # Invariants
//! - `id` is generated at merge time and never reused after removal.
//! - `original` equals the text at `range` when the suggestion is created.
//! - `confidence` is always within `[0, 1]`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one pending suggestion within a session.
pub type SuggestionId = Uuid;

/// Half-open `[start, end)` range in Unicode scalar offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Converts this range into byte offsets of `text`.
    ///
    /// Returns `None` when the range is inverted or runs past the text end.
    pub fn byte_bounds(&self, text: &str) -> Option<(usize, usize)> {
        if self.start > self.end {
            return None;
        }
        let start = char_to_byte(text, self.start)?;
        let end = char_to_byte(text, self.end)?;
        Some((start, end))
    }

    /// Returns the slice of `text` covered by this range.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        let (start, end) = self.byte_bounds(text)?;
        Some(&text[start..end])
    }
}

impl Display for TextRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Converts a char offset into a byte offset; `char_count` maps to `len()`.
pub(crate) fn char_to_byte(text: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }
    let mut seen = 0usize;
    for (byte_index, _) in text.char_indices() {
        if seen == char_offset {
            return Some(byte_index);
        }
        seen += 1;
    }
    (seen == char_offset).then_some(text.len())
}

/// Coarse grouping used by the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    /// Grammar, spelling and punctuation fixes.
    Correctness,
    /// Wordiness, passive voice and readability.
    Clarity,
    /// Vocabulary variety and word choice.
    Engagement,
    /// Tone and formality.
    Delivery,
}

impl SuggestionCategory {
    pub const ALL: [SuggestionCategory; 4] = [
        Self::Correctness,
        Self::Clarity,
        Self::Engagement,
        Self::Delivery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correctness => "correctness",
            Self::Clarity => "clarity",
            Self::Engagement => "engagement",
            Self::Delivery => "delivery",
        }
    }
}

/// Fine-grained suggestion kind reported by the checking service.
///
/// Unknown kinds are preserved verbatim and fall back to
/// `SuggestionCategory::Correctness`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SuggestionKind {
    Grammar,
    Spelling,
    Punctuation,
    Capitalization,
    Style,
    Clarity,
    PassiveVoice,
    Wordiness,
    Redundancy,
    WordChoice,
    Vocabulary,
    Repetition,
    Tone,
    Formality,
    Other(String),
}

impl SuggestionKind {
    /// Parses a wire kind string; matching is case- and separator-insensitive.
    pub fn parse(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "grammar" => Self::Grammar,
            "spelling" => Self::Spelling,
            "punctuation" => Self::Punctuation,
            "capitalization" => Self::Capitalization,
            "style" => Self::Style,
            "clarity" => Self::Clarity,
            "passive-voice" | "passive" => Self::PassiveVoice,
            "wordiness" | "conciseness" => Self::Wordiness,
            "redundancy" => Self::Redundancy,
            "word-choice" => Self::WordChoice,
            "vocabulary" | "engagement" => Self::Vocabulary,
            "repetition" => Self::Repetition,
            "tone" | "delivery" => Self::Tone,
            "formality" => Self::Formality,
            _ => Self::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Grammar => "grammar",
            Self::Spelling => "spelling",
            Self::Punctuation => "punctuation",
            Self::Capitalization => "capitalization",
            Self::Style => "style",
            Self::Clarity => "clarity",
            Self::PassiveVoice => "passive-voice",
            Self::Wordiness => "wordiness",
            Self::Redundancy => "redundancy",
            Self::WordChoice => "word-choice",
            Self::Vocabulary => "vocabulary",
            Self::Repetition => "repetition",
            Self::Tone => "tone",
            Self::Formality => "formality",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Deterministic kind -> category mapping.
    pub fn category(&self) -> SuggestionCategory {
        match self {
            Self::Grammar | Self::Spelling | Self::Punctuation | Self::Capitalization => {
                SuggestionCategory::Correctness
            }
            Self::Style | Self::Clarity | Self::PassiveVoice | Self::Wordiness | Self::Redundancy => {
                SuggestionCategory::Clarity
            }
            Self::WordChoice | Self::Vocabulary | Self::Repetition => SuggestionCategory::Engagement,
            Self::Tone | Self::Formality => SuggestionCategory::Delivery,
            Self::Other(_) => SuggestionCategory::Correctness,
        }
    }
}

impl From<String> for SuggestionKind {
    fn from(value: String) -> Self {
        Self::parse(value.as_str())
    }
}

impl From<SuggestionKind> for String {
    fn from(value: SuggestionKind) -> Self {
        value.as_str().to_string()
    }
}

impl Display for SuggestionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending grammar/style suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub range: TextRange,
    pub category: SuggestionCategory,
    /// Serialized as `type` to match the checking service schema.
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub original: String,
    pub proposed: String,
    pub explanation: String,
    pub confidence: f64,
    /// Bumped whenever refine/regenerate replaces the payload in place.
    pub revision: u32,
}

impl Suggestion {
    /// Creates a suggestion with a freshly generated id.
    ///
    /// `category` is derived from `kind` and `confidence` is clamped.
    pub fn new(
        range: TextRange,
        kind: SuggestionKind,
        original: impl Into<String>,
        proposed: impl Into<String>,
        explanation: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4(),
            range,
            kind,
            original,
            proposed,
            explanation,
            confidence,
        )
    }

    /// Creates a suggestion with a caller-provided id.
    pub fn with_id(
        id: SuggestionId,
        range: TextRange,
        kind: SuggestionKind,
        original: impl Into<String>,
        proposed: impl Into<String>,
        explanation: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id,
            range,
            category: kind.category(),
            kind,
            original: original.into(),
            proposed: proposed.into(),
            explanation: explanation.into(),
            confidence: clamp_confidence(confidence),
            revision: 0,
        }
    }

    /// Returns whether `text` still holds `original` at `range`.
    pub fn matches_text(&self, text: &str) -> bool {
        self.range.slice(text) == Some(self.original.as_str())
    }
}

/// Clamps a service confidence into `[0, 1]`; NaN becomes `0`.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
