//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive one scripted editor session against an in-process rule checker.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `scribe_cli [TEXT]`. Set `SCRIBE_LOG_DIR` to an absolute path to
//! write engine logs there.

use scribe_core::{
    core_version, init_logging, ApplyOutcome, CheckRequest, CheckResponse, EditorSession,
    EngineConfig, GrammarService, InMemoryDictionary, LoggingOptions, RawSuggestion,
    ServiceError, SuggestionKind,
};
use std::error::Error;
use std::time::{Duration, Instant};

const DEFAULT_TEXT: &str = "I has a apple. Teh acme tool is great.";
const MAX_APPLY_ROUNDS: usize = 32;

/// Word-level rules standing in for the remote grammar service.
struct RuleChecker;

impl RuleChecker {
    fn words(text: &str) -> Vec<(usize, usize, String)> {
        let mut words = Vec::new();
        let mut current: Option<(usize, String)> = None;
        for (index, ch) in text.chars().enumerate() {
            if ch.is_alphanumeric() {
                current.get_or_insert_with(|| (index, String::new())).1.push(ch);
            } else if let Some((start, word)) = current.take() {
                words.push((start, index, word));
            }
        }
        if let Some((start, word)) = current {
            let end = start + word.chars().count();
            words.push((start, end, word));
        }
        words
    }
}

impl GrammarService for RuleChecker {
    fn check(&self, request: &CheckRequest) -> Result<CheckResponse, ServiceError> {
        let words = Self::words(&request.text);
        let mut suggestions = Vec::new();
        for (index, (start, end, word)) in words.iter().enumerate() {
            let previous = index.checked_sub(1).map(|prev| words[prev].2.as_str());
            let next = words.get(index + 1).map(|next| next.2.as_str());
            let fix = match (word.as_str(), previous, next) {
                ("has", Some("I"), _) if request.include_grammar => {
                    Some(("have", SuggestionKind::Grammar, "Use \"have\" with \"I\"."))
                }
                ("a", _, Some(next))
                    if request.include_grammar
                        && next.starts_with(['a', 'e', 'i', 'o', 'u']) =>
                {
                    Some(("an", SuggestionKind::Grammar, "Use \"an\" before a vowel sound."))
                }
                ("Teh", _, _) if request.include_spelling => {
                    Some(("The", SuggestionKind::Spelling, "Possible misspelling."))
                }
                ("acme", _, _) if request.include_spelling => {
                    Some(("acne", SuggestionKind::Spelling, "Possible misspelling."))
                }
                _ => None,
            };
            if let Some((proposed, kind, explanation)) = fix {
                suggestions.push(RawSuggestion {
                    start: *start,
                    end: *end,
                    original: word.clone(),
                    proposed: proposed.to_string(),
                    explanation: explanation.to_string(),
                    kind,
                    confidence: 0.9,
                });
            }
        }
        Ok(CheckResponse { suggestions })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("SCRIBE_LOG_DIR") {
        let mut options = LoggingOptions::new(log_dir);
        options.echo_warnings = true;
        init_logging(&options)?;
    }

    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_TEXT.to_string());
    let config = EngineConfig::editor();
    let settle = config.debounce();
    let checker = RuleChecker;
    let mut dictionary = InMemoryDictionary::new();
    let mut session = EditorSession::with_text(config, "")?;
    let start = Instant::now();

    println!("scribe_core version={}", core_version());
    session.load_document(&text, start)?;
    let completion = session.drive(&checker, start + settle)?;
    println!("check={completion:?}");
    print_suggestions(&session);

    let dispatch = session.add_dictionary_word(&mut dictionary, "acme", start + settle)?;
    if let Some(dispatch) = dispatch {
        println!("dictionary recheck={:?}", session.run_check(&checker, dispatch)?);
    }

    let mut now = start + settle;
    for _ in 0..MAX_APPLY_ROUNDS {
        let Some(id) = session.store().ids().first().copied() else {
            break;
        };
        now += settle + Duration::from_millis(10);
        match session.apply_suggestion(id, now)? {
            ApplyOutcome::Applied { snapshot, .. } => println!("applied -> {}", snapshot.content),
            other => {
                println!("skipped {id}: {other:?}");
                session.dismiss_suggestion(id)?;
            }
        }
        session.drive(&checker, now + settle)?;
    }

    let metrics = session.metrics();
    println!(
        "words={} sentences={} grade={:?} reading_secs={}",
        metrics.word_count,
        metrics.sentence_count,
        metrics.readability_grade,
        metrics.reading_time_secs
    );
    Ok(())
}

fn print_suggestions(session: &EditorSession) {
    for (category, suggestions) in session.categorized() {
        for suggestion in suggestions {
            println!(
                "  [{}] {} {:?} -> {:?} ({})",
                category.as_str(),
                suggestion.range,
                suggestion.original,
                suggestion.proposed,
                suggestion.kind
            );
        }
    }
}
