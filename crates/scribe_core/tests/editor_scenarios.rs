use scribe_core::{
    decode_check_response, classify, ApplyOutcome, CheckCompletion, CheckErrorKind, CheckGate,
    CheckRequest, CheckResponse, DecorationHost, EditorSession, EngineConfig, GrammarService,
    InMemoryDictionary, MutationTag, MutationTags, RawSuggestion, ScheduleOutcome, ServiceError,
    SuggestionCategory, SuggestionKind, TextRange,
};
use std::cell::RefCell;
use std::time::{Duration, Instant};

/// Returns canned JSON bodies in order and records every request text.
struct ScriptedService {
    bodies: RefCell<Vec<Result<String, ServiceError>>>,
    seen: RefCell<Vec<String>>,
}

impl ScriptedService {
    fn new(bodies: Vec<Result<&str, ServiceError>>) -> Self {
        Self {
            bodies: RefCell::new(
                bodies
                    .into_iter()
                    .rev()
                    .map(|body| body.map(str::to_string))
                    .collect(),
            ),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl GrammarService for ScriptedService {
    fn check(&self, request: &CheckRequest) -> Result<CheckResponse, ServiceError> {
        self.seen.borrow_mut().push(request.text.clone());
        let body = self
            .bodies
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Ok(r#"{"suggestions":[]}"#.to_string()))?;
        decode_check_response(&body)
    }
}

const APPLE_RESPONSE: &str = r#"{
  "suggestions": [
    {"start": 2, "end": 5, "original": "has", "suggestion": "have",
     "type": "grammar", "explanation": "Subject-verb agreement.", "confidence": 0.95},
    {"start": 6, "end": 7, "original": "a", "suggestion": "an",
     "type": "grammar", "explanation": "Use 'an' before a vowel sound."}
  ]
}"#;

fn config() -> EngineConfig {
    EngineConfig {
        debounce_ms: 1_000,
        recheck_after_apply: false,
        ..EngineConfig::editor()
    }
}

fn ms(start: Instant, millis: u64) -> Instant {
    start + Duration::from_millis(millis)
}

fn type_text(session: &mut EditorSession, text: &str, now: Instant) {
    let end = session.text().chars().count();
    session
        .handle_user_edit(TextRange::new(0, end), text, now)
        .unwrap();
}

#[test]
fn apple_scenario_apply_then_second_suggestion_still_applies() {
    let start = Instant::now();
    let service = ScriptedService::new(vec![Ok(APPLE_RESPONSE)]);
    let mut session = EditorSession::with_text(config(), "").unwrap();

    type_text(&mut session, "I has a apple.", start);
    assert!(session.drive(&service, ms(start, 999)).unwrap().is_none());
    let completion = session.drive(&service, ms(start, 1_000)).unwrap();
    assert_eq!(
        completion,
        Some(CheckCompletion::Merged {
            accepted: 2,
            dropped: 0
        })
    );
    assert_eq!(session.decorations().len(), 2);

    let counts = session.counts_by_category();
    assert_eq!(counts[&SuggestionCategory::Correctness], 2);
    assert_eq!(counts[&SuggestionCategory::Clarity], 0);

    let has_id = session.store().ids()[0];
    let article_id = session.store().ids()[1];
    let outcome = session.apply_suggestion(has_id, ms(start, 2_000)).unwrap();
    assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
    assert_eq!(session.text(), "I have a apple.");

    // The remaining decoration followed the edit.
    assert_eq!(
        session.document().anchor(article_id),
        Some(TextRange::new(7, 8))
    );
    session.apply_suggestion(article_id, ms(start, 2_100)).unwrap();
    assert_eq!(session.text(), "I have an apple.");
    assert_eq!(service.request_count(), 1);
    assert!(session.drive(&service, ms(start, 60_000)).unwrap().is_none());
}

#[test]
fn apply_with_recheck_schedules_exactly_one_follow_up() {
    let start = Instant::now();
    let service = ScriptedService::new(vec![Ok(APPLE_RESPONSE)]);
    let config = EngineConfig {
        recheck_after_apply: true,
        ..config()
    };
    let mut session = EditorSession::with_text(config, "").unwrap();

    type_text(&mut session, "I has a apple.", start);
    session.drive(&service, ms(start, 1_000)).unwrap();
    let id = session.store().ids()[0];

    match session.apply_suggestion(id, ms(start, 1_500)).unwrap() {
        ApplyOutcome::Applied { recheck, .. } => {
            assert_eq!(recheck, Some(ScheduleOutcome::Scheduled));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    session.drive(&service, ms(start, 2_500)).unwrap();
    session.drive(&service, ms(start, 10_000)).unwrap();
    assert_eq!(service.request_count(), 2);
    assert_eq!(service.seen.borrow()[1], "I have a apple.");
}

#[test]
fn empty_document_never_calls_the_service() {
    let start = Instant::now();
    let service = ScriptedService::new(Vec::new());
    let mut session = EditorSession::with_text(config(), "").unwrap();

    let report = session.load_document("", start).unwrap();
    assert_eq!(report.schedule, Some(ScheduleOutcome::Cleared));
    assert!(report.snapshot.is_empty);
    assert!(session.drive(&service, ms(start, 5_000)).unwrap().is_none());
    assert_eq!(service.request_count(), 0);
    assert!(!session.is_loading());
    assert!(session.store().is_empty());
}

#[test]
fn dictionary_scenario_suppresses_spelling_flag() {
    let start = Instant::now();
    let acme = r#"{"suggestions":[{"start":8,"end":12,"original":"acme",
        "proposed":"acne","type":"spelling"}]}"#;
    let service = ScriptedService::new(vec![Ok(acme), Ok(acme)]);
    let mut session = EditorSession::with_text(config(), "").unwrap();
    let mut dictionary = InMemoryDictionary::new();

    type_text(&mut session, "We love acme tools.", start);
    session.drive(&service, ms(start, 1_000)).unwrap();
    assert_eq!(session.store().len(), 1);

    let dispatch = session
        .add_dictionary_word(&mut dictionary, "acme", ms(start, 1_100))
        .unwrap()
        .unwrap();
    let completion = session.run_check(&service, dispatch).unwrap();
    assert_eq!(
        completion,
        CheckCompletion::Merged {
            accepted: 0,
            dropped: 1
        }
    );
    assert!(session.store().is_empty());
    assert!(session.decorations().is_empty());
}

#[test]
fn stale_completion_after_typing_is_discarded() {
    let start = Instant::now();
    let mut session = EditorSession::with_text(config(), "").unwrap();

    type_text(&mut session, "I has a apple.", start);
    let dispatch = session.poll(ms(start, 1_000)).dispatch.unwrap();
    type_text(&mut session, "I has a apple. More", ms(start, 1_200));

    let response = decode_check_response(APPLE_RESPONSE).unwrap();
    let completion = session.complete_check(dispatch.ticket, Ok(response)).unwrap();
    assert_eq!(completion, CheckCompletion::Stale);
    assert!(session.store().is_empty());
    assert!(session.decorations().is_empty());
    assert_eq!(
        session.poll(ms(start, 2_200)).dispatch.unwrap().request.text,
        "I has a apple. More"
    );
}

#[test]
fn failed_check_keeps_previous_suggestions_and_retry_bypasses_dedup() {
    let start = Instant::now();
    let service = ScriptedService::new(vec![
        Ok(APPLE_RESPONSE),
        Err(ServiceError::Auth("token expired".to_string())),
    ]);
    let mut session = EditorSession::with_text(config(), "").unwrap();

    type_text(&mut session, "I has a apple.", start);
    session.drive(&service, ms(start, 1_000)).unwrap();
    let retry = session.retry_last_check(ms(start, 1_100)).unwrap();
    let completion = session.run_check(&service, retry).unwrap();

    match completion {
        CheckCompletion::Failed(error) => assert_eq!(error.kind, CheckErrorKind::Auth),
        other => panic!("unexpected completion {other:?}"),
    }
    assert_eq!(session.store().len(), 2);
    assert_eq!(session.suggestion_count(), None);
    assert!(!session.is_loading());
}

#[test]
fn timeout_surfaces_network_error() {
    let start = Instant::now();
    let mut session = EditorSession::with_text(config(), "").unwrap();

    type_text(&mut session, "Some text here.", start);
    let dispatch = session.poll(ms(start, 1_000)).dispatch.unwrap();
    assert!(session.is_loading());

    let outcome = session.poll(ms(start, 16_000));
    assert!(outcome.check_timed_out);
    assert!(!session.is_loading());
    assert_eq!(session.error().unwrap().kind, CheckErrorKind::Network);

    let late = session
        .complete_check(dispatch.ticket, Ok(CheckResponse::default()))
        .unwrap();
    assert_eq!(late, CheckCompletion::Stale);
}

#[test]
fn suggestions_with_mismatched_ranges_are_dropped() {
    let start = Instant::now();
    let body = r#"{"suggestions":[
        {"start":0,"end":4,"original":"nope","proposed":"yes","type":"style"},
        {"start":2,"end":5,"original":"has","proposed":"has","type":"grammar"}
    ]}"#;
    let service = ScriptedService::new(vec![Ok(body)]);
    let mut session = EditorSession::with_text(config(), "").unwrap();

    type_text(&mut session, "I has a apple.", start);
    let completion = session.drive(&service, ms(start, 1_000)).unwrap();
    assert_eq!(
        completion,
        Some(CheckCompletion::Merged {
            accepted: 0,
            dropped: 2
        })
    );
}

#[test]
fn programmatic_tags_never_allow_checks() {
    for tag in [
        MutationTag::ApplySuggestion,
        MutationTag::ApplyMarks,
        MutationTag::DictionaryRecheck,
        MutationTag::LoadDocument,
        MutationTag::HistoryMerge,
    ] {
        assert_eq!(classify(&MutationTags::of(tag)), CheckGate::Suppress);
    }
    assert_eq!(classify(&MutationTags::user()), CheckGate::Allow);
}

#[test]
fn raw_suggestion_kind_keeps_unknown_types() {
    let raw: RawSuggestion = serde_json::from_str(
        r#"{"start":0,"end":1,"original":"I","proposed":"We","type":"inclusive-language"}"#,
    )
    .unwrap();
    assert_eq!(raw.kind, SuggestionKind::Other("inclusive-language".to_string()));
    assert_eq!(raw.kind.category(), SuggestionCategory::Correctness);
}
