//! Text metrics for the editor status bar.
//!
//! # Responsibility
//! - Count words, characters, sentences and paragraphs of plain text.
//! - Estimate reading/speaking time and a Flesch-Kincaid grade level.
//!
//! # Invariants
//! - Pure: the same text always yields the same metrics.
//! - Empty text has zero counts and no readability grade.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const READING_WORDS_PER_MINUTE: f64 = 238.0;
const SPEAKING_WORDS_PER_MINUTE: f64 = 150.0;

static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’-][\p{L}\p{N}]+)*").expect("valid word regex")
});
static SENTENCE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?…]+").expect("valid sentence regex"));
static VOWEL_GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[aeiouy]+").expect("valid vowel regex"));

/// Metrics snapshot for one version of the document text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextMetrics {
    pub word_count: usize,
    pub character_count: usize,
    pub character_count_no_spaces: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub syllable_count: usize,
    pub reading_time_secs: u64,
    pub speaking_time_secs: u64,
    /// Flesch-Kincaid grade, `None` for text without words.
    pub readability_grade: Option<f64>,
}

impl TextMetrics {
    /// Short label for the grade-level tooltip.
    pub fn readability_label(&self) -> Option<&'static str> {
        let grade = self.readability_grade?;
        Some(if grade <= 5.0 {
            "very easy"
        } else if grade <= 8.0 {
            "easy"
        } else if grade <= 10.0 {
            "standard"
        } else if grade <= 12.0 {
            "fairly difficult"
        } else if grade <= 16.0 {
            "difficult"
        } else {
            "very difficult"
        })
    }
}

/// Computes metrics for `text`.
pub fn compute(text: &str) -> TextMetrics {
    let words = WORD_RE
        .find_iter(text)
        .map(|found| found.as_str())
        .collect::<Vec<_>>();
    let word_count = words.len();
    let syllable_count = words.iter().map(|word| count_syllables(word)).sum::<usize>();
    let sentence_count = SENTENCE_SPLIT_RE
        .split(text)
        .filter(|segment| WORD_RE.is_match(segment))
        .count();
    let paragraph_count = text.lines().filter(|line| !line.trim().is_empty()).count();

    let readability_grade = (word_count > 0).then(|| {
        let sentences = sentence_count.max(1) as f64;
        let words = word_count as f64;
        let grade = 0.39 * (words / sentences) + 11.8 * (syllable_count as f64 / words) - 15.59;
        (grade.max(0.0) * 10.0).round() / 10.0
    });

    TextMetrics {
        word_count,
        character_count: text.chars().count(),
        character_count_no_spaces: text.chars().filter(|ch| !ch.is_whitespace()).count(),
        sentence_count,
        paragraph_count,
        syllable_count,
        reading_time_secs: minutes_to_secs(word_count, READING_WORDS_PER_MINUTE),
        speaking_time_secs: minutes_to_secs(word_count, SPEAKING_WORDS_PER_MINUTE),
        readability_grade,
    }
}

fn minutes_to_secs(words: usize, words_per_minute: f64) -> u64 {
    (words as f64 / words_per_minute * 60.0).ceil() as u64
}

/// Heuristic English syllable count (vowel groups, silent trailing `e`).
fn count_syllables(word: &str) -> usize {
    let lower = word
        .chars()
        .filter(|ch| ch.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect::<String>();
    if lower.is_empty() {
        return 0;
    }
    if lower.chars().count() <= 3 {
        return 1;
    }

    let trimmed = if lower.ends_with("es") || lower.ends_with("ed") {
        &lower[..lower.len() - 2]
    } else if lower.ends_with('e') && !lower.ends_with("le") {
        &lower[..lower.len() - 1]
    } else {
        lower.as_str()
    };
    VOWEL_GROUP_RE.find_iter(trimmed).count().max(1)
}
