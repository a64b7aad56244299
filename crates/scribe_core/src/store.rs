//! Suggestion store for the active document session.
//!
//! # Responsibility
//! - Hold pending suggestions keyed by stable id in insertion order.
//! - Provide dismiss/apply/refine-replace primitives used by the session.
//! - Group suggestions by category for sidebar display.
//!
//! # Invariants
//! - Membership is the suggestion status: present = pending, removed = terminal.
//! - Dismissing an absent id is a no-op.
//! - `apply_locally` never splices into drifted text.

use crate::model::suggestion::{Suggestion, SuggestionCategory, SuggestionId};
use std::collections::{BTreeMap, HashMap};

/// Insertion-ordered suggestion map.
#[derive(Debug, Clone, Default)]
pub struct SuggestionStore {
    order: Vec<SuggestionId>,
    entries: HashMap<SuggestionId, Suggestion>,
}

impl SuggestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: SuggestionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: SuggestionId) -> Option<&Suggestion> {
        self.entries.get(&id)
    }

    /// Pending ids in insertion order.
    pub fn ids(&self) -> &[SuggestionId] {
        &self.order
    }

    /// Pending suggestions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Suggestion> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Cloned snapshot in insertion order.
    pub fn to_vec(&self) -> Vec<Suggestion> {
        self.iter().cloned().collect()
    }

    /// Replaces the full contents with a fresh check result.
    ///
    /// Duplicate ids in `suggestions` keep their first occurrence.
    pub fn replace_all(&mut self, suggestions: Vec<Suggestion>) {
        self.clear();
        for suggestion in suggestions {
            if self.entries.contains_key(&suggestion.id) {
                continue;
            }
            self.order.push(suggestion.id);
            self.entries.insert(suggestion.id, suggestion);
        }
    }

    /// Removes one suggestion; returns whether it was pending.
    pub fn dismiss(&mut self, id: SuggestionId) -> bool {
        self.remove(id).is_some()
    }

    /// Removes one suggestion and returns it.
    pub fn remove(&mut self, id: SuggestionId) -> Option<Suggestion> {
        let removed = self.entries.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        Some(removed)
    }

    /// Empties the store unconditionally.
    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    /// Computes the text produced by applying one suggestion to `current_text`.
    ///
    /// Returns `None` when the id is not pending or the text at the recorded
    /// range no longer equals `original`. The store is not modified.
    pub fn apply_locally(&self, id: SuggestionId, current_text: &str) -> Option<String> {
        let suggestion = self.entries.get(&id)?;
        let (start, end) = suggestion.range.byte_bounds(current_text)?;
        if &current_text[start..end] != suggestion.original.as_str() {
            return None;
        }

        let mut next = String::with_capacity(
            current_text.len() - (end - start) + suggestion.proposed.len(),
        );
        next.push_str(&current_text[..start]);
        next.push_str(suggestion.proposed.as_str());
        next.push_str(&current_text[end..]);
        Some(next)
    }

    /// Replaces proposal text in place, keeping the id and bumping revision.
    ///
    /// Returns the new revision, or `None` when the id is no longer pending.
    pub fn replace_payload(
        &mut self,
        id: SuggestionId,
        proposed: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Option<u32> {
        let suggestion = self.entries.get_mut(&id)?;
        suggestion.proposed = proposed.into();
        suggestion.explanation = explanation.into();
        suggestion.revision = suggestion.revision.saturating_add(1);
        Some(suggestion.revision)
    }

    /// Groups current suggestions by category.
    pub fn categorized(&self) -> BTreeMap<SuggestionCategory, Vec<Suggestion>> {
        categorize(&self.to_vec())
    }

    /// Per-category pending counts; every category is present.
    pub fn counts_by_category(&self) -> BTreeMap<SuggestionCategory, usize> {
        let mut counts = SuggestionCategory::ALL
            .iter()
            .map(|category| (*category, 0usize))
            .collect::<BTreeMap<_, _>>();
        for suggestion in self.iter() {
            *counts.entry(suggestion.kind.category()).or_default() += 1;
        }
        counts
    }
}

/// Groups suggestions by category derived from their kind.
///
/// Pure: input order is preserved within each category and categories with
/// no suggestions are omitted.
pub fn categorize(suggestions: &[Suggestion]) -> BTreeMap<SuggestionCategory, Vec<Suggestion>> {
    let mut grouped = BTreeMap::<SuggestionCategory, Vec<Suggestion>>::new();
    for suggestion in suggestions {
        grouped
            .entry(suggestion.kind.category())
            .or_default()
            .push(suggestion.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::{categorize, SuggestionStore};
    use crate::model::suggestion::{Suggestion, SuggestionCategory, SuggestionKind, TextRange};

    fn teh_suggestion() -> Suggestion {
        Suggestion::new(
            TextRange::new(5, 8),
            SuggestionKind::Spelling,
            "teh",
            "the",
            "Possible typo",
            0.9,
        )
    }

    #[test]
    fn replace_all_preserves_insertion_order() {
        let first = teh_suggestion();
        let second = Suggestion::new(
            TextRange::new(0, 4),
            SuggestionKind::Style,
            "Very",
            "",
            "Filler word",
            0.4,
        );
        let mut store = SuggestionStore::new();
        store.replace_all(vec![first.clone(), second.clone()]);

        assert_eq!(store.ids(), &[first.id, second.id]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn dismiss_is_idempotent() {
        let suggestion = teh_suggestion();
        let mut store = SuggestionStore::new();
        store.replace_all(vec![suggestion.clone()]);

        assert!(store.dismiss(suggestion.id));
        assert!(!store.dismiss(suggestion.id));
        assert!(store.is_empty());
    }

    #[test]
    fn apply_locally_splices_when_text_matches() {
        let suggestion = teh_suggestion();
        let mut store = SuggestionStore::new();
        store.replace_all(vec![suggestion.clone()]);

        let next = store.apply_locally(suggestion.id, "Now, teh end");
        assert_eq!(next.as_deref(), Some("Now, the end"));
        assert!(store.contains(suggestion.id));
    }

    #[test]
    fn apply_locally_rejects_drifted_text() {
        let suggestion = teh_suggestion();
        let mut store = SuggestionStore::new();
        store.replace_all(vec![suggestion.clone()]);

        assert_eq!(store.apply_locally(suggestion.id, "Now,  teh end"), None);
        assert_eq!(store.apply_locally(suggestion.id, "Now"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_payload_bumps_revision_in_place() {
        let suggestion = teh_suggestion();
        let mut store = SuggestionStore::new();
        store.replace_all(vec![suggestion.clone()]);

        assert_eq!(store.replace_payload(suggestion.id, "thee", "Archaic"), Some(1));
        let updated = store.get(suggestion.id).unwrap();
        assert_eq!(updated.proposed, "thee");
        assert_eq!(updated.original, "teh");
        assert_eq!(store.ids(), &[suggestion.id]);
    }

    #[test]
    fn categorize_is_pure_and_order_preserving() {
        let a = Suggestion::new(TextRange::new(0, 1), SuggestionKind::Spelling, "a", "b", "", 1.0);
        let b = Suggestion::new(TextRange::new(1, 2), SuggestionKind::Tone, "b", "c", "", 1.0);
        let c = Suggestion::new(TextRange::new(2, 3), SuggestionKind::Grammar, "c", "d", "", 1.0);
        let list = vec![a.clone(), b.clone(), c.clone()];

        let first = categorize(&list);
        let second = categorize(&list);
        assert_eq!(first, second);
        assert_eq!(first[&SuggestionCategory::Correctness], vec![a, c]);
        assert_eq!(first[&SuggestionCategory::Delivery], vec![b]);
        assert!(!first.contains_key(&SuggestionCategory::Clarity));
    }

    #[test]
    fn counts_cover_every_category() {
        let mut store = SuggestionStore::new();
        store.replace_all(vec![teh_suggestion()]);
        let counts = store.counts_by_category();
        assert_eq!(counts.len(), 4);
        assert_eq!(counts[&SuggestionCategory::Correctness], 1);
        assert_eq!(counts[&SuggestionCategory::Engagement], 0);
    }
}
