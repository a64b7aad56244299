//! Grammar-suggestion engine for the Scribe writing assistant.
//! Debounces checks, reconciles inline decorations and guards against
//! apply/re-check feedback loops. Performs no network I/O itself.

pub mod check;
pub mod config;
pub mod dictionary;
pub mod document;
pub mod error;
pub mod guard;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod reconcile;
pub mod schedule;
pub mod service;
pub mod session;
pub mod store;

pub use check::{
    surrounding_context, CheckCompletion, CheckDispatch, CheckOrchestrator, CheckPhase,
    PollOutcome, RefineCompletion, RefineDispatch, RefineError, ScheduleOutcome,
};
pub use config::{ConfigError, EngineConfig};
pub use dictionary::{
    normalize_word, DictionaryError, DictionaryResult, InMemoryDictionary, PersonalDictionary,
    SqliteDictionary, SCHEMA_VERSION,
};
pub use document::{AnchorChange, DecorationHost, Document, DocumentError, MutationEvent};
pub use error::{CheckError, CheckErrorKind};
pub use guard::{classify, CheckGate, MutationTag, MutationTags};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError, LoggingOptions};
pub use metrics::TextMetrics;
pub use model::suggestion::{
    Suggestion, SuggestionCategory, SuggestionId, SuggestionKind, TextRange,
};
pub use reconcile::{
    Decoration, MarkReconciler, ReconcileMode, ReconcileReport, SuggestionDetail,
};
pub use schedule::{Debouncer, RequestToken, SingleFlight};
pub use service::{
    decode_check_response, decode_refine_response, encode_check_request, CheckRequest,
    CheckResponse, GrammarService, RawSuggestion, RefineMode, RefineRequest, RefineResponse,
    RefineService, ServiceError,
};
pub use session::{
    ApplyOutcome, ChangeReport, DocumentSnapshot, EditorSession, SessionError, SessionResult,
};
pub use store::{categorize, SuggestionStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
