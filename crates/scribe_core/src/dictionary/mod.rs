//! Personal dictionary contracts and storage.
//!
//! # Responsibility
//! - Define the dictionary collaborator used by the editor session.
//! - Provide in-memory and SQLite-backed implementations.
//!
//! # Invariants
//! - Words are single tokens; lookup is case-insensitive.
//! - Adding an existing word and removing an absent word are no-ops.
//! - `all_words` returns display forms sorted by normalized key.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod schema;
mod sqlite;

pub use schema::{schema_version, SCHEMA_VERSION};
pub use sqlite::SqliteDictionary;

const MAX_WORD_CHARS: usize = 64;

pub type DictionaryResult<T> = Result<T, DictionaryError>;

/// Dictionary validation and storage errors.
#[derive(Debug)]
pub enum DictionaryError {
    InvalidWord(String),
    Sqlite(rusqlite::Error),
    /// The database was written by a newer build.
    SchemaTooNew { found: u32, supported: u32 },
}

impl DictionaryError {
    /// Stable code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidWord(_) => "invalid_word",
            Self::Sqlite(_) => "sqlite",
            Self::SchemaTooNew { .. } => "schema_too_new",
        }
    }
}

impl Display for DictionaryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWord(word) => write!(f, "invalid dictionary word: `{word}`"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "dictionary schema version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for DictionaryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidWord(_) | Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DictionaryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Personal dictionary collaborator.
pub trait PersonalDictionary {
    /// Adds a word; returns whether it was newly added.
    fn add_word(&mut self, word: &str) -> DictionaryResult<bool>;
    /// Removes a word; returns whether it was present.
    fn remove_word(&mut self, word: &str) -> DictionaryResult<bool>;
    fn all_words(&self) -> DictionaryResult<Vec<String>>;

    fn contains(&self, word: &str) -> DictionaryResult<bool> {
        let key = normalize_word(word)?;
        Ok(self
            .all_words()?
            .iter()
            .any(|existing| existing.to_lowercase() == key))
    }
}

/// Validates one word and returns its lookup key.
pub fn normalize_word(word: &str) -> DictionaryResult<String> {
    let trimmed = word.trim();
    if trimmed.is_empty()
        || trimmed.chars().any(char::is_whitespace)
        || trimmed.chars().count() > MAX_WORD_CHARS
    {
        return Err(DictionaryError::InvalidWord(trimmed.to_string()));
    }
    Ok(trimmed.to_lowercase())
}

/// Process-local dictionary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDictionary {
    words: BTreeMap<String, String>,
}

impl InMemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl PersonalDictionary for InMemoryDictionary {
    fn add_word(&mut self, word: &str) -> DictionaryResult<bool> {
        let key = normalize_word(word)?;
        if self.words.contains_key(&key) {
            return Ok(false);
        }
        self.words.insert(key, word.trim().to_string());
        Ok(true)
    }

    fn remove_word(&mut self, word: &str) -> DictionaryResult<bool> {
        let key = normalize_word(word)?;
        Ok(self.words.remove(&key).is_some())
    }

    fn all_words(&self) -> DictionaryResult<Vec<String>> {
        Ok(self.words.values().cloned().collect())
    }

    fn contains(&self, word: &str) -> DictionaryResult<bool> {
        Ok(self.words.contains_key(&normalize_word(word)?))
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_word, DictionaryError, InMemoryDictionary, PersonalDictionary};

    #[test]
    fn normalize_rejects_empty_and_multi_token_words() {
        assert!(matches!(normalize_word("  "), Err(DictionaryError::InvalidWord(_))));
        assert!(matches!(normalize_word("two words"), Err(DictionaryError::InvalidWord(_))));
        assert_eq!(normalize_word(" Acme ").unwrap(), "acme");
    }

    #[test]
    fn in_memory_dictionary_is_case_insensitive() {
        let mut dictionary = InMemoryDictionary::new();
        assert!(dictionary.add_word("Acme").unwrap());
        assert!(!dictionary.add_word("acme").unwrap());
        assert!(dictionary.contains("ACME").unwrap());
        assert_eq!(dictionary.all_words().unwrap(), vec!["Acme".to_string()]);

        assert!(dictionary.remove_word("aCmE").unwrap());
        assert!(!dictionary.remove_word("acme").unwrap());
        assert!(dictionary.is_empty());
    }
}
