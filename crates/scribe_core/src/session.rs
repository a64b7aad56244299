//! Editor session: the host-facing operation set for one open document.
//!
//! # Responsibility
//! - Route document mutations through the feedback-loop guard.
//! - Keep the suggestion store, decorations and metrics in step with edits.
//! - Apply, dismiss and refine suggestions; hand dictionary changes to checks.
//!
//! # Invariants
//! - Only untagged (user) mutations schedule an implicit check.
//! - The store is updated before decorations are reconciled against it.
//! - Applying a suggestion never edits text that drifted from `original`.
//! - Every handled change yields a [`DocumentSnapshot`] for persistence.

use crate::check::{
    CheckCompletion, CheckDispatch, CheckOrchestrator, PollOutcome, RefineCompletion,
    RefineDispatch, RefineError, ScheduleOutcome,
};
use crate::config::{ConfigError, EngineConfig};
use crate::dictionary::{DictionaryError, PersonalDictionary};
use crate::document::{DecorationHost, Document, DocumentError, MutationEvent};
use crate::error::CheckError;
use crate::guard::{classify, CheckGate, MutationTag, MutationTags};
use crate::metrics::{self, TextMetrics};
use crate::model::suggestion::{Suggestion, SuggestionCategory, SuggestionId, TextRange};
use crate::reconcile::{MarkReconciler, ReconcileMode, ReconcileReport, SuggestionDetail};
use crate::service::{
    CheckResponse, GrammarService, RefineMode, RefineResponse, RefineService, ServiceError,
};
use crate::schedule::RequestToken;
use crate::store::SuggestionStore;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Persistence hand-off produced after every handled change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub content: String,
    pub word_count: usize,
    pub character_count: usize,
    pub is_empty: bool,
}

/// What the session did with one document mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeReport {
    pub gate: CheckGate,
    pub snapshot: DocumentSnapshot,
    /// Set when the change reached the orchestrator.
    pub schedule: Option<ScheduleOutcome>,
    /// Set when the change also required a decoration pass.
    pub marks: Option<ReconcileReport>,
}

/// Result of applying one suggestion.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied {
        snapshot: DocumentSnapshot,
        /// Follow-up check scheduling, when re-check after apply is enabled.
        recheck: Option<ScheduleOutcome>,
    },
    /// Text under the suggestion no longer equals `original`; nothing changed.
    /// Carries a `validation` error the host may show next to the suggestion.
    Drifted(CheckError),
    /// The suggestion is not pending.
    NotFound,
}

/// Session operation failures.
#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    Document(DocumentError),
    Dictionary(DictionaryError),
    Refine(RefineError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Document(err) => write!(f, "{err}"),
            Self::Dictionary(err) => write!(f, "{err}"),
            Self::Refine(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Document(err) => Some(err),
            Self::Dictionary(err) => Some(err),
            Self::Refine(err) => Some(err),
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DocumentError> for SessionError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

impl From<DictionaryError> for SessionError {
    fn from(value: DictionaryError) -> Self {
        Self::Dictionary(value)
    }
}

impl From<RefineError> for SessionError {
    fn from(value: RefineError) -> Self {
        Self::Refine(value)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One open document plus its suggestion engine.
#[derive(Debug)]
pub struct EditorSession<D: DecorationHost = Document> {
    document: D,
    store: SuggestionStore,
    orchestrator: CheckOrchestrator,
    marks: MarkReconciler,
    metrics: TextMetrics,
}

impl EditorSession<Document> {
    /// Opens an in-memory document holding `text`.
    pub fn with_text(config: EngineConfig, text: &str) -> SessionResult<Self> {
        Self::new(config, Document::new(text))
    }
}

impl<D: DecorationHost> EditorSession<D> {
    /// Wraps a host document. No check is scheduled until the first change.
    pub fn new(config: EngineConfig, document: D) -> SessionResult<Self> {
        config.validate()?;
        let metrics = metrics::compute(document.plain_text());
        Ok(Self {
            document,
            store: SuggestionStore::new(),
            orchestrator: CheckOrchestrator::new(config),
            marks: MarkReconciler::new(),
            metrics,
        })
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn text(&self) -> &str {
        self.document.plain_text()
    }

    pub fn store(&self) -> &SuggestionStore {
        &self.store
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.store.to_vec()
    }

    pub fn categorized(&self) -> BTreeMap<SuggestionCategory, Vec<Suggestion>> {
        self.store.categorized()
    }

    pub fn counts_by_category(&self) -> BTreeMap<SuggestionCategory, usize> {
        self.store.counts_by_category()
    }

    pub fn decorations(&self) -> &MarkReconciler {
        &self.marks
    }

    pub fn orchestrator(&self) -> &CheckOrchestrator {
        &self.orchestrator
    }

    pub fn metrics(&self) -> &TextMetrics {
        &self.metrics
    }

    pub fn is_loading(&self) -> bool {
        self.orchestrator.is_loading()
    }

    pub fn error(&self) -> Option<&CheckError> {
        self.orchestrator.error()
    }

    pub fn suggestion_count(&self) -> Option<usize> {
        self.orchestrator.last_suggestion_count()
    }

    pub fn is_refining(&self, id: SuggestionId) -> bool {
        self.orchestrator.is_refining(id)
    }

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.orchestrator.next_deadline()
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        let content = self.document.plain_text().to_string();
        DocumentSnapshot {
            is_empty: content.trim().is_empty(),
            word_count: self.metrics.word_count,
            character_count: self.metrics.character_count,
            content,
        }
    }

    /// Hover/click detail for a decorated suggestion.
    pub fn suggestion_detail(&self, id: SuggestionId) -> Option<SuggestionDetail> {
        self.marks.detail(id)
    }

    /// Replaces the document with a newly loaded one and schedules a check.
    pub fn load_document(&mut self, text: &str, now: Instant) -> SessionResult<ChangeReport> {
        self.orchestrator.reset();
        self.store.clear();
        self.marks.forget_all();

        let event = self
            .document
            .replace_all(text, MutationTags::of(MutationTag::LoadDocument));
        let mut report = self.handle_change(&event, now)?;
        report.schedule = Some(self.orchestrator.check_text(
            self.document.plain_text(),
            now,
            &mut self.store,
        ));
        info!(
            "event=document_load module=session status=ok chars={} revision={}",
            self.metrics.character_count, event.revision
        );
        Ok(report)
    }

    /// Handles one mutation already applied to the host document.
    pub fn handle_change(&mut self, event: &MutationEvent, now: Instant) -> SessionResult<ChangeReport> {
        let gate = classify(&event.tags);
        if event.text_changed {
            self.metrics = metrics::compute(self.document.plain_text());
        }
        let mut report = ChangeReport {
            gate,
            snapshot: self.snapshot(),
            schedule: None,
            marks: None,
        };

        if gate == CheckGate::Suppress || !event.text_changed {
            debug!(
                "event=document_change module=session status=skip tags={} revision={}",
                event.tags, event.revision
            );
            return Ok(report);
        }

        let outcome = self
            .orchestrator
            .check_text(self.document.plain_text(), now, &mut self.store);
        if outcome == ScheduleOutcome::Cleared {
            report.marks = Some(self.reconcile(ReconcileMode::Maintain)?);
        }
        report.schedule = Some(outcome);
        Ok(report)
    }

    /// Replaces `range` with typed text as a user mutation.
    pub fn handle_user_edit(
        &mut self,
        range: TextRange,
        text: &str,
        now: Instant,
    ) -> SessionResult<ChangeReport> {
        let event = self.document.replace_range(range, text, MutationTags::user())?;
        self.handle_change(&event, now)
    }

    /// Restores undo/redo content without triggering an implicit check.
    pub fn restore_history(&mut self, text: &str, now: Instant) -> SessionResult<ChangeReport> {
        let event = self
            .document
            .replace_all(text, MutationTags::of(MutationTag::HistoryMerge));
        self.marks.forget_all();
        self.orchestrator
            .observe_programmatic_change(self.document.plain_text());
        let mut report = self.handle_change(&event, now)?;
        report.marks = Some(self.reconcile(ReconcileMode::Fresh)?);
        Ok(report)
    }

    /// Schedules a debounced check of the current text.
    pub fn check_text(&mut self, now: Instant) -> ScheduleOutcome {
        self.orchestrator
            .check_text(self.document.plain_text(), now, &mut self.store)
    }

    pub fn retry_last_check(&mut self, now: Instant) -> Option<CheckDispatch> {
        self.orchestrator.retry_last_check(now)
    }

    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        self.orchestrator.poll(now)
    }

    /// Reports a check result; a merged result is decorated immediately.
    pub fn complete_check(
        &mut self,
        ticket: RequestToken,
        result: Result<CheckResponse, ServiceError>,
    ) -> SessionResult<CheckCompletion> {
        let completion = self
            .orchestrator
            .complete_check(ticket, result, &mut self.store);
        if matches!(completion, CheckCompletion::Merged { .. }) {
            self.reconcile(ReconcileMode::Fresh)?;
        }
        Ok(completion)
    }

    /// Replaces the suggestion's span with its proposal.
    ///
    /// The decorated span is used when present; otherwise the stored range,
    /// under the same drift rule.
    pub fn apply_suggestion(&mut self, id: SuggestionId, now: Instant) -> SessionResult<ApplyOutcome> {
        let Some(suggestion) = self.store.get(id).cloned() else {
            debug!("event=suggestion_apply module=session status=skip reason=not_pending");
            return Ok(ApplyOutcome::NotFound);
        };

        let tags = MutationTags::of(MutationTag::ApplySuggestion);
        let anchored = self.document.anchor(id).is_some();
        let event = if anchored
            && self.document.anchored_text(id) == Some(suggestion.original.as_str())
        {
            self.document
                .replace_anchored(id, &suggestion.proposed, tags)?
        } else if !anchored
            && self
                .store
                .apply_locally(id, self.document.plain_text())
                .is_some()
        {
            self.document
                .replace_range(suggestion.range, &suggestion.proposed, tags)?
        } else {
            let error = CheckError::drift();
            warn!(
                "event=suggestion_apply module=session status=error error_code={} reason=drift anchored={}",
                error.kind.as_str(),
                anchored
            );
            return Ok(ApplyOutcome::Drifted(error));
        };

        self.store.remove(id);
        self.orchestrator.cancel_refine(id);
        self.orchestrator
            .observe_programmatic_change(self.document.plain_text());
        let change = self.handle_change(&event, now)?;
        self.reconcile(ReconcileMode::Maintain)?;

        let recheck = if self.orchestrator.config().recheck_after_apply {
            Some(self.check_text(now))
        } else {
            None
        };
        info!(
            "event=suggestion_apply module=session status=ok kind={} anchored={} revision={}",
            suggestion.kind, anchored, event.revision
        );
        Ok(ApplyOutcome::Applied {
            snapshot: change.snapshot,
            recheck,
        })
    }

    /// Removes a pending suggestion and its decoration. Idempotent.
    pub fn dismiss_suggestion(&mut self, id: SuggestionId) -> SessionResult<bool> {
        if !self.store.dismiss(id) {
            return Ok(false);
        }
        self.orchestrator.cancel_refine(id);
        self.reconcile(ReconcileMode::Maintain)?;
        info!("event=suggestion_dismiss module=session status=ok");
        Ok(true)
    }

    pub fn refine_suggestion(&mut self, id: SuggestionId, now: Instant) -> SessionResult<RefineDispatch> {
        self.request_refine(id, RefineMode::Refine, now)
    }

    pub fn regenerate_suggestion(
        &mut self,
        id: SuggestionId,
        now: Instant,
    ) -> SessionResult<RefineDispatch> {
        self.request_refine(id, RefineMode::Regenerate, now)
    }

    /// Reports a refine result; an updated payload is re-wrapped in place.
    pub fn complete_refine(
        &mut self,
        ticket: RequestToken,
        result: Result<RefineResponse, ServiceError>,
    ) -> SessionResult<RefineCompletion> {
        let completion = self
            .orchestrator
            .complete_refine(ticket, result, &mut self.store);
        if matches!(completion, RefineCompletion::Updated { .. }) {
            self.reconcile(ReconcileMode::Maintain)?;
        }
        Ok(completion)
    }

    /// Drops every pending suggestion and decoration.
    pub fn clear_suggestions(&mut self) -> SessionResult<ReconcileReport> {
        self.cancel_all_refines();
        self.store.clear();
        Ok(self.reconcile(ReconcileMode::Maintain)?)
    }

    /// Loads the dictionary's words into the merge filter.
    pub fn sync_dictionary<P>(&mut self, dictionary: &P) -> SessionResult<usize>
    where
        P: PersonalDictionary + ?Sized,
    {
        let words = dictionary.all_words()?;
        self.orchestrator.set_ignored_words(&words);
        Ok(words.len())
    }

    /// Adds a word and forces a fresh check of the whole document.
    pub fn add_dictionary_word<P>(
        &mut self,
        dictionary: &mut P,
        word: &str,
        now: Instant,
    ) -> SessionResult<Option<CheckDispatch>>
    where
        P: PersonalDictionary + ?Sized,
    {
        let added = dictionary.add_word(word)?;
        info!("event=dictionary_add module=session status=ok added={added}");
        self.recheck_with_dictionary(dictionary, now)
    }

    /// Removes a word and forces a fresh check of the whole document.
    pub fn remove_dictionary_word<P>(
        &mut self,
        dictionary: &mut P,
        word: &str,
        now: Instant,
    ) -> SessionResult<Option<CheckDispatch>>
    where
        P: PersonalDictionary + ?Sized,
    {
        let removed = dictionary.remove_word(word)?;
        info!("event=dictionary_remove module=session status=ok removed={removed}");
        self.recheck_with_dictionary(dictionary, now)
    }

    /// Polls and runs a due check synchronously against `grammar`.
    ///
    /// Returns `Failed` when the in-flight check timed out during this poll.
    pub fn drive(
        &mut self,
        grammar: &dyn GrammarService,
        now: Instant,
    ) -> SessionResult<Option<CheckCompletion>> {
        let outcome = self.poll(now);
        if let Some(dispatch) = outcome.dispatch {
            return self.run_check(grammar, dispatch).map(Some);
        }
        if outcome.check_timed_out {
            return Ok(self.error().cloned().map(CheckCompletion::Failed));
        }
        Ok(None)
    }

    /// Executes one check dispatch synchronously.
    pub fn run_check(
        &mut self,
        grammar: &dyn GrammarService,
        dispatch: CheckDispatch,
    ) -> SessionResult<CheckCompletion> {
        let result = grammar.check(&dispatch.request);
        self.complete_check(dispatch.ticket, result)
    }

    /// Executes one refine dispatch synchronously.
    pub fn run_refine(
        &mut self,
        refiner: &dyn RefineService,
        dispatch: RefineDispatch,
    ) -> SessionResult<RefineCompletion> {
        let result = refiner.refine(&dispatch.request);
        self.complete_refine(dispatch.ticket, result)
    }

    fn request_refine(
        &mut self,
        id: SuggestionId,
        mode: RefineMode,
        now: Instant,
    ) -> SessionResult<RefineDispatch> {
        let live_range = self.document.anchor(id);
        let dispatch = self.orchestrator.request_refine(
            id,
            mode,
            self.document.plain_text(),
            live_range,
            &self.store,
            now,
        )?;
        Ok(dispatch)
    }

    fn recheck_with_dictionary<P>(
        &mut self,
        dictionary: &P,
        now: Instant,
    ) -> SessionResult<Option<CheckDispatch>>
    where
        P: PersonalDictionary + ?Sized,
    {
        self.sync_dictionary(dictionary)?;
        self.cancel_all_refines();
        self.store.clear();
        let tags = MutationTags::of(MutationTag::ApplyMarks).with(MutationTag::DictionaryRecheck);
        self.marks
            .reconcile_tagged(&self.store, &mut self.document, ReconcileMode::Maintain, tags)?;
        Ok(self
            .orchestrator
            .force_check(self.document.plain_text(), now))
    }

    fn cancel_all_refines(&mut self) {
        for id in self.orchestrator.refining_ids() {
            self.orchestrator.cancel_refine(id);
        }
    }

    fn reconcile(&mut self, mode: ReconcileMode) -> Result<ReconcileReport, DocumentError> {
        self.marks.reconcile(&self.store, &mut self.document, mode)
    }
}
