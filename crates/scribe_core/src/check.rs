//! Grammar check orchestrator.
//!
//! # Responsibility
//! - Debounce text changes and decide whether a check is worth dispatching.
//! - Track the single current check request and discard stale completions.
//! - Merge successful results into the suggestion store (full replace).
//! - Track per-suggestion refine/regenerate requests.
//!
//! # Invariants
//! - At most one check is current; a later dispatch supersedes earlier ones.
//! - A completion is merged only if its text still equals the last requested
//!   text. Texts equal after trimming are merged with ranges rebased onto the
//!   requested text.
//! - Failures keep the previous suggestions and always reset `loading`.
//! - At most one refine request is in flight per suggestion id.
//!
//! The orchestrator performs no I/O: `poll` hands out dispatches and the host
//! reports results through `complete_check` / `complete_refine`.

use crate::config::EngineConfig;
use crate::error::CheckError;
use crate::model::suggestion::{Suggestion, SuggestionId, SuggestionKind, TextRange};
use crate::schedule::{Debouncer, RequestToken, SingleFlight};
use crate::service::{
    CheckRequest, CheckResponse, RefineMode, RefineRequest, RefineResponse, ServiceError,
};
use crate::store::SuggestionStore;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Top-level check state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Idle,
    Debouncing { due_at: Instant },
    Checking { ticket: RequestToken },
}

/// Result of scheduling a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Debounce timer (re)started.
    Scheduled,
    /// Text is empty; pending work cancelled and suggestions cleared.
    Cleared,
    /// Text is shorter than the configured minimum.
    TooShort,
    /// Text equals the last checked text.
    Unchanged,
}

/// One check request to be executed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDispatch {
    pub ticket: RequestToken,
    pub request: CheckRequest,
}

/// One refine/regenerate request to be executed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineDispatch {
    pub ticket: RequestToken,
    pub request: RefineRequest,
}

/// Outcome of reporting a check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckCompletion {
    /// Store replaced with `accepted` suggestions.
    Merged { accepted: usize, dropped: usize },
    /// Error recorded; suggestions untouched.
    Failed(CheckError),
    /// Superseded by a newer request or newer text; ignored.
    Stale,
}

/// Outcome of reporting a refine result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineCompletion {
    Updated { id: SuggestionId, revision: u32 },
    /// Service failed; the suggestion keeps its previous payload.
    Failed { id: SuggestionId, error: ServiceError },
    /// Suggestion was applied/dismissed while refining.
    Discarded(SuggestionId),
    /// Ticket is unknown or already settled.
    Stale,
}

/// Work surfaced by one `poll` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub dispatch: Option<CheckDispatch>,
    /// The current check exceeded the request timeout.
    pub check_timed_out: bool,
    /// Refine requests that exceeded the request timeout.
    pub refines_timed_out: Vec<SuggestionId>,
}

/// Refine request rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineError {
    NotFound(SuggestionId),
    AlreadyRefining(SuggestionId),
}

impl Display for RefineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "suggestion not pending: {id}"),
            Self::AlreadyRefining(id) => write!(f, "suggestion already refining: {id}"),
        }
    }
}

impl Error for RefineError {}

#[derive(Debug, Clone)]
struct InFlightCheck {
    ticket: RequestToken,
    text: String,
    dispatched_at: Instant,
}

#[derive(Debug, Clone)]
struct InFlightRefine {
    ticket: RequestToken,
    mode: RefineMode,
    dispatched_at: Instant,
}

/// Debounced, single-flight grammar check state machine.
#[derive(Debug)]
pub struct CheckOrchestrator {
    config: EngineConfig,
    debouncer: Debouncer<String>,
    flight: SingleFlight,
    in_flight: Option<InFlightCheck>,
    last_checked: Option<String>,
    last_requested: Option<String>,
    loading: bool,
    error: Option<CheckError>,
    suggestion_count: Option<usize>,
    refining: BTreeMap<SuggestionId, InFlightRefine>,
    ignored_words: HashSet<String>,
}

impl CheckOrchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            debouncer: Debouncer::new(config.debounce()),
            config,
            flight: SingleFlight::new(),
            in_flight: None,
            last_checked: None,
            last_requested: None,
            loading: false,
            error: None,
            suggestion_count: None,
            refining: BTreeMap::new(),
            ignored_words: HashSet::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> CheckPhase {
        if let Some(in_flight) = &self.in_flight {
            return CheckPhase::Checking {
                ticket: in_flight.ticket,
            };
        }
        match self.debouncer.due_at() {
            Some(due_at) => CheckPhase::Debouncing { due_at },
            None => CheckPhase::Idle,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&CheckError> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Suggestion count of the last completed check.
    ///
    /// `None` until a check succeeds and again after a failed check.
    pub fn last_suggestion_count(&self) -> Option<usize> {
        self.suggestion_count
    }

    /// Trimmed text of the most recent dispatch.
    pub fn last_checked_text(&self) -> Option<&str> {
        self.last_checked.as_deref()
    }

    pub fn is_refining(&self, id: SuggestionId) -> bool {
        self.refining.contains_key(&id)
    }

    pub fn refining_ids(&self) -> Vec<SuggestionId> {
        self.refining.keys().copied().collect()
    }

    /// Replaces the words whose spelling suggestions are dropped on merge.
    pub fn set_ignored_words<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignored_words = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
    }

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let timeout = self.config.request_timeout();
        let check_deadline = self
            .in_flight
            .as_ref()
            .map(|in_flight| in_flight.dispatched_at + timeout);
        let refine_deadline = self
            .refining
            .values()
            .map(|refine| refine.dispatched_at + timeout)
            .min();
        [self.debouncer.due_at(), check_deadline, refine_deadline]
            .into_iter()
            .flatten()
            .min()
    }

    /// Schedules a debounced check of `text`.
    pub fn check_text(
        &mut self,
        text: &str,
        now: Instant,
        store: &mut SuggestionStore,
    ) -> ScheduleOutcome {
        self.last_requested = Some(text.to_string());
        let key = text.trim();

        if key.is_empty() {
            self.debouncer.cancel();
            self.invalidate_in_flight();
            self.last_checked = None;
            store.clear();
            self.drop_orphaned_refines(store);
            debug!("event=check_schedule module=check status=skip reason=empty");
            return ScheduleOutcome::Cleared;
        }

        if key.chars().count() < self.config.min_check_chars {
            self.debouncer.cancel();
            debug!(
                "event=check_schedule module=check status=skip reason=too_short chars={}",
                key.chars().count()
            );
            return ScheduleOutcome::TooShort;
        }

        if self.last_checked.as_deref() == Some(key) {
            self.debouncer.cancel();
            debug!("event=check_schedule module=check status=skip reason=unchanged");
            return ScheduleOutcome::Unchanged;
        }

        self.debouncer.schedule(text.to_string(), now);
        debug!(
            "event=check_schedule module=check status=ok chars={} debounce_ms={}",
            text.chars().count(),
            self.config.debounce_ms
        );
        ScheduleOutcome::Scheduled
    }

    /// Advances timers: expires overdue requests and fires the debounce.
    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        let timeout = self.config.request_timeout();
        let mut outcome = PollOutcome::default();

        let check_overdue = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| now >= in_flight.dispatched_at + timeout);
        if check_overdue {
            if let Some(in_flight) = self.in_flight.take() {
                self.flight.settle(in_flight.ticket);
                warn!(
                    "event=check_complete module=check status=error ticket={} error_code=timeout",
                    in_flight.ticket.value()
                );
            }
            self.loading = false;
            self.last_checked = None;
            self.suggestion_count = None;
            self.error = Some(CheckError::timeout());
            outcome.check_timed_out = true;
        }

        let overdue_refines = self
            .refining
            .iter()
            .filter(|(_, refine)| now >= refine.dispatched_at + timeout)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for id in overdue_refines {
            if let Some(refine) = self.refining.remove(&id) {
                warn!(
                    "event=refine_complete module=check status=error mode={} ticket={} error_code=timeout",
                    refine.mode.as_str(),
                    refine.ticket.value()
                );
            }
            outcome.refines_timed_out.push(id);
        }

        if let Some(text) = self.debouncer.poll(now) {
            outcome.dispatch = Some(self.dispatch(text, now));
        }
        outcome
    }

    /// Re-issues the most recent text immediately, bypassing deduplication.
    pub fn retry_last_check(&mut self, now: Instant) -> Option<CheckDispatch> {
        let text = self.last_requested.clone()?;
        if !self.is_checkable(&text) {
            return None;
        }
        self.debouncer.cancel();
        info!("event=check_retry module=check status=start");
        Some(self.dispatch(text, now))
    }

    /// Checks `text` immediately, bypassing debounce and deduplication.
    pub fn force_check(&mut self, text: &str, now: Instant) -> Option<CheckDispatch> {
        self.last_requested = Some(text.to_string());
        if !self.is_checkable(text) {
            return None;
        }
        self.debouncer.cancel();
        Some(self.dispatch(text.to_string(), now))
    }

    /// Reports the result of a dispatched check.
    pub fn complete_check(
        &mut self,
        ticket: RequestToken,
        result: Result<CheckResponse, ServiceError>,
        store: &mut SuggestionStore,
    ) -> CheckCompletion {
        if !self.flight.settle(ticket) {
            debug!(
                "event=check_complete module=check status=skip reason=superseded ticket={}",
                ticket.value()
            );
            return CheckCompletion::Stale;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return CheckCompletion::Stale;
        };
        self.loading = false;

        let requested = match self.last_requested.as_deref() {
            Some(requested) if requested.trim() == in_flight.text.trim() => requested.to_string(),
            _ => {
                self.last_checked = None;
                debug!(
                    "event=check_complete module=check status=skip reason=text_changed ticket={}",
                    ticket.value()
                );
                return CheckCompletion::Stale;
            }
        };

        match result {
            Ok(mut response) => {
                let shift = leading_whitespace(&requested) as isize
                    - leading_whitespace(&in_flight.text) as isize;
                if shift != 0 {
                    rebase_suggestions(&mut response, shift);
                    debug!(
                        "event=check_complete module=check status=rebase ticket={} shift={}",
                        ticket.value(),
                        shift
                    );
                }
                let (accepted, dropped) =
                    materialize_suggestions(&requested, response, &self.ignored_words);
                let count = accepted.len();
                store.replace_all(accepted);
                self.drop_orphaned_refines(store);
                self.error = None;
                self.suggestion_count = Some(count);
                info!(
                    "event=check_complete module=check status=ok ticket={} accepted={} dropped={}",
                    ticket.value(),
                    count,
                    dropped
                );
                CheckCompletion::Merged {
                    accepted: count,
                    dropped,
                }
            }
            Err(err) => {
                let error = CheckError::from(&err);
                warn!(
                    "event=check_complete module=check status=error ticket={} error_code={} service_code={}",
                    ticket.value(),
                    error.kind.as_str(),
                    err.code()
                );
                self.error = Some(error.clone());
                self.suggestion_count = None;
                CheckCompletion::Failed(error)
            }
        }
    }

    /// Makes any in-flight check stale without waiting for its completion.
    pub fn invalidate_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!(
                "event=check_invalidate module=check status=ok ticket={}",
                in_flight.ticket.value()
            );
            self.last_checked = None;
        }
        self.flight.invalidate();
        self.loading = false;
    }

    /// Records a programmatic text change that bypassed `check_text`.
    ///
    /// Pending and in-flight work for the previous text can no longer merge.
    pub fn observe_programmatic_change(&mut self, text: &str) {
        self.debouncer.cancel();
        self.invalidate_in_flight();
        self.last_requested = Some(text.to_string());
    }

    /// Starts a refine/regenerate request for one pending suggestion.
    ///
    /// `live_range` is the suggestion's current decorated span, when known;
    /// context is cut around it from `text`.
    pub fn request_refine(
        &mut self,
        id: SuggestionId,
        mode: RefineMode,
        text: &str,
        live_range: Option<TextRange>,
        store: &SuggestionStore,
        now: Instant,
    ) -> Result<RefineDispatch, RefineError> {
        let suggestion = store.get(id).ok_or(RefineError::NotFound(id))?;
        if self.refining.contains_key(&id) {
            debug!(
                "event=refine_request module=check status=skip reason=in_flight mode={}",
                mode.as_str()
            );
            return Err(RefineError::AlreadyRefining(id));
        }

        let range = live_range.unwrap_or(suggestion.range);
        let context = surrounding_context(text, range, self.config.refine_context_chars);
        let ticket = self.flight.issue_detached();
        self.refining.insert(
            id,
            InFlightRefine {
                ticket,
                mode,
                dispatched_at: now,
            },
        );
        info!(
            "event=refine_request module=check status=start mode={} ticket={} context_chars={}",
            mode.as_str(),
            ticket.value(),
            context.chars().count()
        );

        Ok(RefineDispatch {
            ticket,
            request: RefineRequest {
                suggestion_id: id,
                mode,
                kind: suggestion.kind.clone(),
                original: suggestion.original.clone(),
                proposed: suggestion.proposed.clone(),
                context,
            },
        })
    }

    /// Reports the result of a refine/regenerate request.
    pub fn complete_refine(
        &mut self,
        ticket: RequestToken,
        result: Result<RefineResponse, ServiceError>,
        store: &mut SuggestionStore,
    ) -> RefineCompletion {
        let Some(id) = self
            .refining
            .iter()
            .find(|(_, refine)| refine.ticket == ticket)
            .map(|(id, _)| *id)
        else {
            return RefineCompletion::Stale;
        };
        let Some(refine) = self.refining.remove(&id) else {
            return RefineCompletion::Stale;
        };

        match result {
            Ok(response) => match store.replace_payload(id, response.proposed, response.explanation) {
                Some(revision) => {
                    info!(
                        "event=refine_complete module=check status=ok mode={} ticket={} revision={}",
                        refine.mode.as_str(),
                        ticket.value(),
                        revision
                    );
                    RefineCompletion::Updated { id, revision }
                }
                None => RefineCompletion::Discarded(id),
            },
            Err(error) => {
                warn!(
                    "event=refine_complete module=check status=error mode={} ticket={} error_code={} service_code={}",
                    refine.mode.as_str(),
                    ticket.value(),
                    CheckError::from(&error).kind.as_str(),
                    error.code()
                );
                RefineCompletion::Failed { id, error }
            }
        }
    }

    /// Drops the refine bookkeeping for a suggestion that left the store.
    pub fn cancel_refine(&mut self, id: SuggestionId) -> bool {
        self.refining.remove(&id).is_some()
    }

    /// Forgets refine requests whose suggestion left the store.
    fn drop_orphaned_refines(&mut self, store: &SuggestionStore) {
        let before = self.refining.len();
        self.refining.retain(|id, _| store.contains(*id));
        let dropped = before - self.refining.len();
        if dropped > 0 {
            debug!("event=refine_cancel module=check status=ok reason=store_replaced dropped={dropped}");
        }
    }

    /// Returns to a pristine state for a newly loaded document.
    pub fn reset(&mut self) {
        self.debouncer.cancel();
        self.invalidate_in_flight();
        self.last_checked = None;
        self.last_requested = None;
        self.error = None;
        self.suggestion_count = None;
        self.refining.clear();
    }

    fn is_checkable(&self, text: &str) -> bool {
        let key = text.trim();
        !key.is_empty() && key.chars().count() >= self.config.min_check_chars
    }

    fn dispatch(&mut self, text: String, now: Instant) -> CheckDispatch {
        let ticket = self.flight.issue();
        if let Some(previous) = self.in_flight.take() {
            debug!(
                "event=check_dispatch module=check status=supersede previous_ticket={}",
                previous.ticket.value()
            );
        }
        self.last_checked = Some(text.trim().to_string());
        self.loading = true;
        self.in_flight = Some(InFlightCheck {
            ticket,
            text: text.clone(),
            dispatched_at: now,
        });
        info!(
            "event=check_dispatch module=check status=start ticket={} chars={}",
            ticket.value(),
            text.chars().count()
        );

        CheckDispatch {
            ticket,
            request: CheckRequest {
                text,
                include_spelling: self.config.include_spelling,
                include_grammar: self.config.include_grammar,
                include_style: self.config.include_style,
            },
        }
    }
}

/// Turns a raw response into validated suggestions with fresh ids.
///
/// Drops suggestions whose range does not hold `original` in `text`, no-op
/// proposals, exact duplicates and spelling flags on ignored words.
fn materialize_suggestions(
    text: &str,
    response: CheckResponse,
    ignored_words: &HashSet<String>,
) -> (Vec<Suggestion>, usize) {
    let mut accepted = Vec::with_capacity(response.suggestions.len());
    let mut seen = BTreeSet::<(usize, usize, String)>::new();
    let mut dropped = 0usize;

    for raw in response.suggestions {
        let range = TextRange::new(raw.start, raw.end);
        let reason = if range.slice(text) != Some(raw.original.as_str()) {
            Some("range_mismatch")
        } else if raw.proposed == raw.original {
            Some("no_op")
        } else if raw.kind == SuggestionKind::Spelling
            && ignored_words.contains(&raw.original.trim().to_lowercase())
        {
            Some("dictionary")
        } else if !seen.insert((range.start, range.end, raw.proposed.clone())) {
            Some("duplicate")
        } else {
            None
        };

        if let Some(reason) = reason {
            debug!(
                "event=suggestion_drop module=check status=skip reason={} kind={} range={}",
                reason, raw.kind, range
            );
            dropped += 1;
            continue;
        }

        accepted.push(Suggestion::new(
            range,
            raw.kind,
            raw.original,
            raw.proposed,
            raw.explanation,
            raw.confidence,
        ));
    }

    (accepted, dropped)
}

/// Count of leading whitespace chars; the only offset difference between two
/// texts that are equal after trimming.
fn leading_whitespace(text: &str) -> usize {
    text.chars().take_while(|ch| ch.is_whitespace()).count()
}

/// Moves every raw range by `shift` chars. Ranges pushed below zero are left
/// inverted so validation drops them.
fn rebase_suggestions(response: &mut CheckResponse, shift: isize) {
    for raw in &mut response.suggestions {
        match (
            raw.start.checked_add_signed(shift),
            raw.end.checked_add_signed(shift),
        ) {
            (Some(start), Some(end)) => {
                raw.start = start;
                raw.end = end;
            }
            _ => {
                raw.start = 1;
                raw.end = 0;
            }
        }
    }
}

/// Cuts up to `radius` chars on each side of `range`, widened to whole words.
pub fn surrounding_context(text: &str, range: TextRange, radius: usize) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    let end = range.end.min(chars.len());
    let start = range.start.min(end);

    let mut from = start.saturating_sub(radius);
    while from > 0 && !chars[from - 1].is_whitespace() {
        from -= 1;
    }
    let mut to = (end + radius).min(chars.len());
    while to < chars.len() && !chars[to].is_whitespace() {
        to += 1;
    }

    chars[from..to].iter().collect::<String>().trim().to_string()
}
