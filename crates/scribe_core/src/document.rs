//! Range-addressable document with inline decoration anchors.
//!
//! # Responsibility
//! - Own the plain-text projection the engine uses as its coordinate space.
//! - Keep decoration anchors attached to their text while edits happen around
//!   or inside them.
//! - Emit one tagged `MutationEvent` per mutation.
//!
//! # Invariants
//! - Tags are attached inside the same call that performs the mutation.
//! - At most one anchor exists per suggestion id.
//! - A non-empty anchor whose text is fully deleted is dropped.
//!
//! `DecorationHost` is the seam a real rich-text editor implements; `Document`
//! is the in-memory realization used by the session, the CLI and tests.

use crate::guard::MutationTags;
use crate::model::suggestion::{char_to_byte, SuggestionId, TextRange};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One decoration anchor change inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorChange {
    /// Wrap `range` for `id`, replacing an existing anchor for the same id.
    Attach { id: SuggestionId, range: TextRange },
    /// Remove the anchor for `id`; absent ids are ignored.
    Detach { id: SuggestionId },
}

/// Change notification emitted after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub tags: MutationTags,
    /// Document revision after the mutation.
    pub revision: u64,
    /// Whether the plain-text projection changed.
    pub text_changed: bool,
}

/// Document mutation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    InvertedRange(TextRange),
    OutOfBounds { range: TextRange, len: usize },
    UnknownAnchor(SuggestionId),
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvertedRange(range) => write!(f, "inverted range {range}"),
            Self::OutOfBounds { range, len } => {
                write!(f, "range {range} is outside document of {len} chars")
            }
            Self::UnknownAnchor(id) => write!(f, "no decoration anchored for suggestion {id}"),
        }
    }
}

impl Error for DocumentError {}

/// Host adapter contract for tagged mutations and inline decorations.
pub trait DecorationHost {
    /// Current plain-text projection.
    fn plain_text(&self) -> &str;
    /// Live range of the decoration anchored for `id`.
    fn anchor(&self, id: SuggestionId) -> Option<TextRange>;
    /// Ids with a live anchor.
    fn anchor_ids(&self) -> Vec<SuggestionId>;
    /// Applies a batch of anchor changes as one mutation.
    fn apply_anchor_changes(
        &mut self,
        changes: &[AnchorChange],
        tags: MutationTags,
    ) -> Result<MutationEvent, DocumentError>;
    /// Replaces `range` with `text` as unmarked text.
    fn replace_range(
        &mut self,
        range: TextRange,
        text: &str,
        tags: MutationTags,
    ) -> Result<MutationEvent, DocumentError>;
    /// Replaces the anchored span for `id` with unmarked `text`.
    fn replace_anchored(
        &mut self,
        id: SuggestionId,
        text: &str,
        tags: MutationTags,
    ) -> Result<MutationEvent, DocumentError>;
    /// Replaces the whole document and drops every anchor.
    fn replace_all(&mut self, text: &str, tags: MutationTags) -> MutationEvent;

    /// Text currently wrapped by the anchor for `id`.
    fn anchored_text(&self, id: SuggestionId) -> Option<&str> {
        let range = self.anchor(id)?;
        range.slice(self.plain_text())
    }
}

/// In-memory document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    text: String,
    char_len: usize,
    anchors: BTreeMap<SuggestionId, TextRange>,
    revision: u64,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            char_len: text.chars().count(),
            text,
            anchors: BTreeMap::new(),
            revision: 0,
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Inserts `text` at char offset `at`.
    pub fn insert(
        &mut self,
        at: usize,
        text: &str,
        tags: MutationTags,
    ) -> Result<MutationEvent, DocumentError> {
        self.replace_range(TextRange::new(at, at), text, tags)
    }

    /// Deletes `range`.
    pub fn delete(
        &mut self,
        range: TextRange,
        tags: MutationTags,
    ) -> Result<MutationEvent, DocumentError> {
        self.replace_range(range, "", tags)
    }

    fn check_range(&self, range: TextRange) -> Result<(), DocumentError> {
        if range.start > range.end {
            return Err(DocumentError::InvertedRange(range));
        }
        if range.end > self.char_len {
            return Err(DocumentError::OutOfBounds {
                range,
                len: self.char_len,
            });
        }
        Ok(())
    }

    fn bump(&mut self, tags: MutationTags, text_changed: bool) -> MutationEvent {
        self.revision += 1;
        MutationEvent {
            tags,
            revision: self.revision,
            text_changed,
        }
    }

    fn splice(&mut self, range: TextRange, replacement: &str) -> Result<(), DocumentError> {
        self.check_range(range)?;
        let start = char_to_byte(&self.text, range.start).ok_or(DocumentError::OutOfBounds {
            range,
            len: self.char_len,
        })?;
        let end = char_to_byte(&self.text, range.end).ok_or(DocumentError::OutOfBounds {
            range,
            len: self.char_len,
        })?;
        let inserted = replacement.chars().count();
        self.text.replace_range(start..end, replacement);
        self.char_len = self.char_len - range.len() + inserted;

        self.anchors = std::mem::take(&mut self.anchors)
            .into_iter()
            .filter_map(|(id, anchor)| {
                shift_anchor(anchor, range, inserted).map(|shifted| (id, shifted))
            })
            .collect();
        Ok(())
    }
}

impl DecorationHost for Document {
    fn plain_text(&self) -> &str {
        self.text.as_str()
    }

    fn anchor(&self, id: SuggestionId) -> Option<TextRange> {
        self.anchors.get(&id).copied()
    }

    fn anchor_ids(&self) -> Vec<SuggestionId> {
        self.anchors.keys().copied().collect()
    }

    fn apply_anchor_changes(
        &mut self,
        changes: &[AnchorChange],
        tags: MutationTags,
    ) -> Result<MutationEvent, DocumentError> {
        for change in changes {
            if let AnchorChange::Attach { range, .. } = change {
                self.check_range(*range)?;
            }
        }
        for change in changes {
            match change {
                AnchorChange::Attach { id, range } => {
                    self.anchors.insert(*id, *range);
                }
                AnchorChange::Detach { id } => {
                    self.anchors.remove(id);
                }
            }
        }
        Ok(self.bump(tags, false))
    }

    fn replace_range(
        &mut self,
        range: TextRange,
        text: &str,
        tags: MutationTags,
    ) -> Result<MutationEvent, DocumentError> {
        self.splice(range, text)?;
        Ok(self.bump(tags, true))
    }

    fn replace_anchored(
        &mut self,
        id: SuggestionId,
        text: &str,
        tags: MutationTags,
    ) -> Result<MutationEvent, DocumentError> {
        let range = self.anchor(id).ok_or(DocumentError::UnknownAnchor(id))?;
        self.check_range(range)?;
        self.anchors.remove(&id);
        self.splice(range, text)?;
        Ok(self.bump(tags, true))
    }

    fn replace_all(&mut self, text: &str, tags: MutationTags) -> MutationEvent {
        self.text = text.to_string();
        self.char_len = self.text.chars().count();
        self.anchors.clear();
        self.bump(tags, true)
    }
}

/// Maps an anchor through the replacement of `edit` by `inserted` chars.
///
/// Insertions at an anchor boundary stay outside the anchor. Returns `None`
/// when a non-empty anchor collapses.
fn shift_anchor(anchor: TextRange, edit: TextRange, inserted: usize) -> Option<TextRange> {
    let map_start = |pos: usize| {
        if pos < edit.start {
            pos
        } else if pos >= edit.end {
            pos - edit.len() + inserted
        } else {
            edit.start + inserted
        }
    };
    let map_end = |pos: usize| {
        if pos <= edit.start {
            pos
        } else if pos >= edit.end {
            pos - edit.len() + inserted
        } else {
            edit.start
        }
    };

    if anchor.is_empty() {
        let pos = map_start(anchor.start);
        return Some(TextRange::new(pos, pos));
    }

    let shifted = TextRange::new(map_start(anchor.start), map_end(anchor.end));
    (!shifted.is_empty()).then_some(shifted)
}

#[cfg(test)]
mod tests {
    use super::{shift_anchor, AnchorChange, DecorationHost, Document, DocumentError};
    use crate::guard::{MutationTag, MutationTags};
    use crate::model::suggestion::TextRange;
    use uuid::Uuid;

    fn anchored(text: &str, range: TextRange) -> (Document, Uuid) {
        let mut doc = Document::new(text);
        let id = Uuid::new_v4();
        doc.apply_anchor_changes(
            &[AnchorChange::Attach { id, range }],
            MutationTags::of(MutationTag::ApplyMarks),
        )
        .unwrap();
        (doc, id)
    }

    #[test]
    fn typing_before_anchor_shifts_it() {
        let (mut doc, id) = anchored("I has a apple.", TextRange::new(2, 5));
        doc.insert(0, "So ", MutationTags::user()).unwrap();

        assert_eq!(doc.text(), "So I has a apple.");
        assert_eq!(doc.anchored_text(id), Some("has"));
    }

    #[test]
    fn typing_at_anchor_end_stays_outside() {
        let (mut doc, id) = anchored("I has a apple.", TextRange::new(2, 5));
        doc.insert(5, "!", MutationTags::user()).unwrap();

        assert_eq!(doc.anchor(id), Some(TextRange::new(2, 5)));
    }

    #[test]
    fn typing_inside_anchor_grows_it() {
        let (mut doc, id) = anchored("I has a apple.", TextRange::new(2, 5));
        doc.insert(3, "x", MutationTags::user()).unwrap();

        assert_eq!(doc.anchored_text(id), Some("hxas"));
    }

    #[test]
    fn deleting_anchor_text_drops_anchor() {
        let (mut doc, id) = anchored("I has a apple.", TextRange::new(2, 5));
        doc.delete(TextRange::new(1, 6), MutationTags::user()).unwrap();

        assert_eq!(doc.text(), "Ia apple.");
        assert_eq!(doc.anchor(id), None);
    }

    #[test]
    fn replace_anchored_swaps_span_and_keeps_other_anchors() {
        let mut doc = Document::new("I has a apple.");
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        doc.apply_anchor_changes(
            &[
                AnchorChange::Attach {
                    id: first,
                    range: TextRange::new(2, 5),
                },
                AnchorChange::Attach {
                    id: second,
                    range: TextRange::new(6, 7),
                },
            ],
            MutationTags::of(MutationTag::ApplyMarks),
        )
        .unwrap();

        let event = doc
            .replace_anchored(first, "have", MutationTags::of(MutationTag::ApplySuggestion))
            .unwrap();

        assert!(event.text_changed);
        assert!(event.tags.contains(MutationTag::ApplySuggestion));
        assert_eq!(doc.text(), "I have a apple.");
        assert_eq!(doc.anchor(first), None);
        assert_eq!(doc.anchored_text(second), Some("a"));
    }

    #[test]
    fn attach_rejects_out_of_bounds_ranges() {
        let mut doc = Document::new("short");
        let err = doc
            .apply_anchor_changes(
                &[AnchorChange::Attach {
                    id: Uuid::new_v4(),
                    range: TextRange::new(3, 9),
                }],
                MutationTags::of(MutationTag::ApplyMarks),
            )
            .unwrap_err();
        assert!(matches!(err, DocumentError::OutOfBounds { len: 5, .. }));
        assert!(doc.anchor_ids().is_empty());
    }

    #[test]
    fn empty_anchor_follows_insertions() {
        let anchor = TextRange::new(4, 4);
        assert_eq!(shift_anchor(anchor, TextRange::new(0, 0), 2), Some(TextRange::new(6, 6)));
        assert_eq!(shift_anchor(anchor, TextRange::new(5, 6), 0), Some(anchor));
    }

    #[test]
    fn multibyte_text_uses_char_offsets() {
        let (mut doc, id) = anchored("café teh", TextRange::new(5, 8));
        doc.insert(0, "¡", MutationTags::user()).unwrap();
        assert_eq!(doc.anchored_text(id), Some("teh"));
        assert_eq!(doc.char_len(), 9);
    }
}
