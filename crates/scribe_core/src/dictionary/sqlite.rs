//! SQLite-backed personal dictionary.
//!
//! # Responsibility
//! - Open the dictionary database and bootstrap its table.
//! - Store a lowercase lookup key plus the display form the user typed.

use super::schema::ensure_schema;
use super::{normalize_word, DictionaryError, DictionaryResult, PersonalDictionary};
use log::{error, info};
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Dictionary persisted in its own SQLite database.
pub struct SqliteDictionary {
    conn: Connection,
}

impl SqliteDictionary {
    /// Opens (or creates) the dictionary database at `path`.
    ///
    /// # Side effects
    /// - Emits `dictionary_open` events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> DictionaryResult<Self> {
        Self::open_with("file", || Connection::open(path))
    }

    /// Opens a throwaway dictionary for previews and tests.
    pub fn open_in_memory() -> DictionaryResult<Self> {
        Self::open_with("memory", Connection::open_in_memory)
    }

    /// Wraps an existing connection, creating the table when missing.
    pub fn from_connection(mut conn: Connection) -> DictionaryResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        ensure_schema(&mut conn)?;
        Ok(Self { conn })
    }

    /// Underlying connection, for hosts that share the database file.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn open_with(
        mode: &'static str,
        connect: impl FnOnce() -> rusqlite::Result<Connection>,
    ) -> DictionaryResult<Self> {
        let started_at = Instant::now();
        let opened = connect()
            .map_err(DictionaryError::from)
            .and_then(Self::from_connection);
        match &opened {
            Ok(_) => info!(
                "event=dictionary_open module=dictionary status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=dictionary_open module=dictionary status=error mode={mode} duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        opened
    }
}

impl PersonalDictionary for SqliteDictionary {
    fn add_word(&mut self, word: &str) -> DictionaryResult<bool> {
        let key = normalize_word(word)?;
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO dictionary_words (word, display) VALUES (?1, ?2);",
            params![key, word.trim()],
        )?;
        Ok(changed > 0)
    }

    fn remove_word(&mut self, word: &str) -> DictionaryResult<bool> {
        let key = normalize_word(word)?;
        let changed = self
            .conn
            .execute("DELETE FROM dictionary_words WHERE word = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn all_words(&self) -> DictionaryResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT display FROM dictionary_words ORDER BY word ASC;")?;
        let words = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(words)
    }

    fn contains(&self, word: &str) -> DictionaryResult<bool> {
        let key = normalize_word(word)?;
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM dictionary_words WHERE word = ?1);",
            [key],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}
