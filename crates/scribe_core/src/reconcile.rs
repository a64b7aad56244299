//! Mark reconciliation between the suggestion store and document decorations.
//!
//! # Responsibility
//! - Keep a side table of decoration payloads keyed by suggestion id.
//! - Diff the table against pending suggestions and patch document anchors.
//! - Serve hover/click details without touching document state.
//!
//! # Invariants
//! - At most one decoration per pending suggestion id.
//! - Decorations are immutable; a changed payload is detached and re-attached.
//! - New decorations are only built from ranges known to match live text.
//! - All anchor changes of one pass are a single `apply-marks` mutation.

use crate::document::{AnchorChange, DecorationHost, DocumentError, MutationEvent};
use crate::guard::{MutationTag, MutationTags};
use crate::model::suggestion::{Suggestion, SuggestionCategory, SuggestionId, SuggestionKind};
use crate::store::SuggestionStore;
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Styling and tooltip payload for one decorated span.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    pub suggestion_id: SuggestionId,
    pub category: SuggestionCategory,
    pub kind: SuggestionKind,
    pub original: String,
    pub proposed: String,
    pub explanation: String,
    pub confidence: f64,
    /// Store revision the payload was copied from.
    pub revision: u32,
}

impl Decoration {
    pub fn from_suggestion(suggestion: &Suggestion) -> Self {
        Self {
            suggestion_id: suggestion.id,
            category: suggestion.category,
            kind: suggestion.kind.clone(),
            original: suggestion.original.clone(),
            proposed: suggestion.proposed.clone(),
            explanation: suggestion.explanation.clone(),
            confidence: suggestion.confidence,
            revision: suggestion.revision,
        }
    }

    /// CSS-style class the host uses for underline styling.
    pub fn style_class(&self) -> String {
        format!("suggestion-{}", self.category.as_str())
    }
}

/// Hover/click details for one decorated suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionDetail {
    pub suggestion_id: SuggestionId,
    pub category: SuggestionCategory,
    pub kind: SuggestionKind,
    pub original: String,
    pub proposed: String,
    pub explanation: String,
    pub confidence: f64,
}

impl From<&Decoration> for SuggestionDetail {
    fn from(value: &Decoration) -> Self {
        Self {
            suggestion_id: value.suggestion_id,
            category: value.category,
            kind: value.kind.clone(),
            original: value.original.clone(),
            proposed: value.proposed.clone(),
            explanation: value.explanation.clone(),
            confidence: value.confidence,
        }
    }
}

/// Whether a pass may create decorations for suggestions lacking one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Right after a merged check: store ranges match the live text.
    Fresh,
    /// After dismiss/apply/refine: only remove and re-wrap.
    Maintain,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub removed: Vec<SuggestionId>,
    pub inserted: Vec<SuggestionId>,
    pub rewrapped: Vec<SuggestionId>,
    /// Pending suggestions left undecorated because their text drifted.
    pub skipped: Vec<SuggestionId>,
    /// Mutation emitted for the anchor changes, if any were needed.
    pub event: Option<MutationEvent>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.event.is_none()
    }
}

/// Decoration side table plus the diffing algorithm.
#[derive(Debug, Clone, Default)]
pub struct MarkReconciler {
    table: BTreeMap<SuggestionId, Decoration>,
}

impl MarkReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn decoration(&self, id: SuggestionId) -> Option<&Decoration> {
        self.table.get(&id)
    }

    pub fn decorated_ids(&self) -> Vec<SuggestionId> {
        self.table.keys().copied().collect()
    }

    /// Non-destructive detail lookup for hover/click.
    pub fn detail(&self, id: SuggestionId) -> Option<SuggestionDetail> {
        self.table.get(&id).map(SuggestionDetail::from)
    }

    /// Forgets table entries without touching the document.
    ///
    /// Used when the document itself dropped every anchor (full replace).
    pub fn forget_all(&mut self) {
        self.table.clear();
    }

    /// Makes document decorations match the pending suggestions.
    pub fn reconcile<D: DecorationHost>(
        &mut self,
        store: &SuggestionStore,
        document: &mut D,
        mode: ReconcileMode,
    ) -> Result<ReconcileReport, DocumentError> {
        self.reconcile_tagged(store, document, mode, MutationTags::of(MutationTag::ApplyMarks))
    }

    /// Same as `reconcile` with extra tags on the emitted mutation.
    pub fn reconcile_tagged<D: DecorationHost>(
        &mut self,
        store: &SuggestionStore,
        document: &mut D,
        mode: ReconcileMode,
        tags: MutationTags,
    ) -> Result<ReconcileReport, DocumentError> {
        let mut report = ReconcileReport::default();
        let mut changes = Vec::new();
        let live_anchors = document.anchor_ids().into_iter().collect::<HashSet<_>>();

        // Anchors collapsed by user edits leave nothing to decorate.
        self.table.retain(|id, _| live_anchors.contains(id));
        for id in &live_anchors {
            if !self.table.contains_key(id) {
                changes.push(AnchorChange::Detach { id: *id });
                report.removed.push(*id);
            }
        }

        let stale = self
            .table
            .keys()
            .filter(|id| !store.contains(**id))
            .copied()
            .collect::<Vec<_>>();
        for id in stale {
            self.table.remove(&id);
            changes.push(AnchorChange::Detach { id });
            report.removed.push(id);
        }

        let text = document.plain_text();
        let mut staged = Vec::new();
        for suggestion in store.iter() {
            match self.table.get(&suggestion.id) {
                Some(existing) if existing.revision == suggestion.revision => {}
                Some(_) => {
                    if let Some(range) = document.anchor(suggestion.id) {
                        changes.push(AnchorChange::Detach { id: suggestion.id });
                        changes.push(AnchorChange::Attach {
                            id: suggestion.id,
                            range,
                        });
                        staged.push(Decoration::from_suggestion(suggestion));
                        report.rewrapped.push(suggestion.id);
                    }
                }
                None if mode == ReconcileMode::Fresh && suggestion.matches_text(text) => {
                    changes.push(AnchorChange::Attach {
                        id: suggestion.id,
                        range: suggestion.range,
                    });
                    staged.push(Decoration::from_suggestion(suggestion));
                    report.inserted.push(suggestion.id);
                }
                None => report.skipped.push(suggestion.id),
            }
        }

        if changes.is_empty() {
            return Ok(report);
        }

        let event = document.apply_anchor_changes(&changes, tags)?;
        for decoration in staged {
            self.table.insert(decoration.suggestion_id, decoration);
        }
        if !report.skipped.is_empty() {
            debug!(
                "event=marks_reconcile module=reconcile status=skip undecorated={}",
                report.skipped.len()
            );
        }
        info!(
            "event=marks_reconcile module=reconcile status=ok mode={:?} removed={} inserted={} rewrapped={}",
            mode,
            report.removed.len(),
            report.inserted.len(),
            report.rewrapped.len()
        );
        report.event = Some(event);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::{MarkReconciler, ReconcileMode};
    use crate::document::{DecorationHost, Document};
    use crate::guard::{MutationTag, MutationTags};
    use crate::model::suggestion::{Suggestion, SuggestionKind, TextRange};
    use crate::store::SuggestionStore;

    fn has_suggestion() -> Suggestion {
        Suggestion::new(
            TextRange::new(2, 5),
            SuggestionKind::Grammar,
            "has",
            "have",
            "Agreement",
            0.9,
        )
    }

    fn article_suggestion() -> Suggestion {
        Suggestion::new(
            TextRange::new(6, 7),
            SuggestionKind::Grammar,
            "a",
            "an",
            "Article before vowel",
            0.8,
        )
    }

    #[test]
    fn fresh_pass_decorates_every_matching_suggestion() {
        let mut doc = Document::new("I has a apple.");
        let mut store = SuggestionStore::new();
        store.replace_all(vec![has_suggestion(), article_suggestion()]);
        let mut marks = MarkReconciler::new();

        let report = marks.reconcile(&store, &mut doc, ReconcileMode::Fresh).unwrap();

        assert_eq!(report.inserted.len(), 2);
        let event = report.event.unwrap();
        assert!(event.tags.contains(MutationTag::ApplyMarks));
        assert!(!event.text_changed);
        assert_eq!(doc.anchor_ids().len(), 2);
    }

    #[test]
    fn second_pass_without_changes_is_noop() {
        let mut doc = Document::new("I has a apple.");
        let mut store = SuggestionStore::new();
        store.replace_all(vec![has_suggestion()]);
        let mut marks = MarkReconciler::new();
        marks.reconcile(&store, &mut doc, ReconcileMode::Fresh).unwrap();
        let revision = doc.revision();

        let report = marks.reconcile(&store, &mut doc, ReconcileMode::Fresh).unwrap();
        assert!(report.is_noop());
        assert_eq!(doc.revision(), revision);
    }

    #[test]
    fn dismissed_suggestion_loses_its_mark() {
        let mut doc = Document::new("I has a apple.");
        let first = has_suggestion();
        let second = article_suggestion();
        let mut store = SuggestionStore::new();
        store.replace_all(vec![first.clone(), second.clone()]);
        let mut marks = MarkReconciler::new();
        marks.reconcile(&store, &mut doc, ReconcileMode::Fresh).unwrap();

        store.dismiss(first.id);
        let report = marks.reconcile(&store, &mut doc, ReconcileMode::Maintain).unwrap();

        assert_eq!(report.removed, vec![first.id]);
        assert_eq!(doc.anchor(first.id), None);
        assert!(doc.anchor(second.id).is_some());
        assert!(marks.decoration(first.id).is_none());
    }

    #[test]
    fn drifted_suggestion_is_not_decorated() {
        let mut doc = Document::new("I had a apple.");
        let mut store = SuggestionStore::new();
        store.replace_all(vec![has_suggestion()]);
        let mut marks = MarkReconciler::new();

        let report = marks.reconcile(&store, &mut doc, ReconcileMode::Fresh).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(report.is_noop());
    }

    #[test]
    fn maintain_pass_never_creates_marks() {
        let mut doc = Document::new("I has a apple.");
        let mut store = SuggestionStore::new();
        store.replace_all(vec![has_suggestion()]);
        let mut marks = MarkReconciler::new();

        let report = marks.reconcile(&store, &mut doc, ReconcileMode::Maintain).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(doc.anchor_ids().is_empty());
    }

    #[test]
    fn refined_payload_is_rewrapped_at_live_anchor() {
        let mut doc = Document::new("I has a apple.");
        let suggestion = has_suggestion();
        let mut store = SuggestionStore::new();
        store.replace_all(vec![suggestion.clone()]);
        let mut marks = MarkReconciler::new();
        marks.reconcile(&store, &mut doc, ReconcileMode::Fresh).unwrap();
        doc.insert(0, "Yes, ", MutationTags::user()).unwrap();

        store.replace_payload(suggestion.id, "have", "Use `have` with `I`.");
        let report = marks.reconcile(&store, &mut doc, ReconcileMode::Maintain).unwrap();

        assert_eq!(report.rewrapped, vec![suggestion.id]);
        assert_eq!(doc.anchored_text(suggestion.id), Some("has"));
        let detail = marks.detail(suggestion.id).unwrap();
        assert_eq!(detail.explanation, "Use `have` with `I`.");
        assert_eq!(marks.decoration(suggestion.id).unwrap().revision, 1);
    }

    #[test]
    fn detail_serializes_with_camel_case_fields() {
        let mut doc = Document::new("I has a apple.");
        let suggestion = has_suggestion();
        let mut store = SuggestionStore::new();
        store.replace_all(vec![suggestion.clone()]);
        let mut marks = MarkReconciler::new();
        marks.reconcile(&store, &mut doc, ReconcileMode::Fresh).unwrap();

        let json = serde_json::to_value(marks.detail(suggestion.id).unwrap()).unwrap();
        assert_eq!(json["suggestionId"], suggestion.id.to_string());
        assert_eq!(json["proposed"], "have");
    }

    #[test]
    fn collapsed_anchor_drops_table_entry() {
        let mut doc = Document::new("I has a apple.");
        let suggestion = has_suggestion();
        let mut store = SuggestionStore::new();
        store.replace_all(vec![suggestion.clone()]);
        let mut marks = MarkReconciler::new();
        marks.reconcile(&store, &mut doc, ReconcileMode::Fresh).unwrap();

        doc.delete(TextRange::new(2, 5), MutationTags::user()).unwrap();
        let report = marks.reconcile(&store, &mut doc, ReconcileMode::Maintain).unwrap();

        assert!(marks.is_empty());
        assert_eq!(report.skipped, vec![suggestion.id]);
    }
}
