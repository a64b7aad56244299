//! Feedback-loop guard for document mutations.
//!
//! # Responsibility
//! - Name the programmatic mutation origins the engine produces.
//! - Classify a mutation's tag set into a check gate.
//!
//! # Invariants
//! - Any programmatic tag suppresses the implicit re-check for that change.
//! - An untagged mutation is user-originated and always allows a check.
//! - Classification is a pure function of the tag set.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Origin tag attached to a programmatic document mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MutationTag {
    /// Replacing a decorated span with the proposed text.
    ApplySuggestion,
    /// Inserting/removing/re-wrapping decorations.
    ApplyMarks,
    /// Clearing decorations ahead of a dictionary-driven re-check.
    DictionaryRecheck,
    /// Replacing the whole document when a new document is loaded.
    LoadDocument,
    /// Restoring content from undo/redo history.
    HistoryMerge,
}

impl MutationTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApplySuggestion => "apply-suggestion",
            Self::ApplyMarks => "apply-marks",
            Self::DictionaryRecheck => "dictionary-recheck",
            Self::LoadDocument => "load-document",
            Self::HistoryMerge => "history-merge",
        }
    }
}

impl Display for MutationTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag set carried by one mutation event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationTags(BTreeSet<MutationTag>);

impl MutationTags {
    /// Empty tag set: a user-originated mutation.
    pub fn user() -> Self {
        Self::default()
    }

    pub fn of(tag: MutationTag) -> Self {
        let mut tags = Self::default();
        tags.insert(tag);
        tags
    }

    pub fn insert(&mut self, tag: MutationTag) {
        self.0.insert(tag);
    }

    pub fn with(mut self, tag: MutationTag) -> Self {
        self.insert(tag);
        self
    }

    pub fn contains(&self, tag: MutationTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = MutationTag> + '_ {
        self.0.iter().copied()
    }
}

impl Display for MutationTags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("user");
        }
        let joined = self.iter().map(MutationTag::as_str).collect::<Vec<_>>();
        f.write_str(&joined.join(","))
    }
}

/// Gate decision for the grammar check orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckGate {
    /// Recompute metrics and schedule a check.
    Allow,
    /// Programmatic change; skip the implicit check.
    Suppress,
}

/// Classifies one mutation's tag set.
pub fn classify(tags: &MutationTags) -> CheckGate {
    if tags.is_empty() {
        CheckGate::Allow
    } else {
        CheckGate::Suppress
    }
}
