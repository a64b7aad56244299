//! Engine tunables.
//!
//! # Responsibility
//! - Provide editor and dashboard-preview presets.
//! - Load host-provided overrides from JSON with per-field defaults.
//!
//! # Invariants
//! - `min_check_chars` is at least 1.
//! - `request_timeout_ms` is strictly greater than zero.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const EDITOR_DEBOUNCE_MS: u64 = 1_000;
const EDITOR_MIN_CHECK_CHARS: usize = 3;
const PREVIEW_DEBOUNCE_MS: u64 = 1_500;
const PREVIEW_MIN_CHECK_CHARS: usize = 10;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_REFINE_CONTEXT_CHARS: usize = 120;

/// Orchestrator and session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet window before a scheduled check is dispatched.
    pub debounce_ms: u64,
    /// Minimum trimmed length (chars) that is worth checking.
    pub min_check_chars: usize,
    /// Upper bound for check/refine calls before they surface as `network`.
    pub request_timeout_ms: u64,
    /// Chars of surrounding text sent with refine/regenerate requests.
    pub refine_context_chars: usize,
    pub include_spelling: bool,
    pub include_grammar: bool,
    pub include_style: bool,
    /// Issue an explicit re-check after a suggestion is applied.
    pub recheck_after_apply: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::editor()
    }
}

impl EngineConfig {
    /// Preset used by the live document editor.
    pub fn editor() -> Self {
        Self {
            debounce_ms: EDITOR_DEBOUNCE_MS,
            min_check_chars: EDITOR_MIN_CHECK_CHARS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refine_context_chars: DEFAULT_REFINE_CONTEXT_CHARS,
            include_spelling: true,
            include_grammar: true,
            include_style: true,
            recheck_after_apply: true,
        }
    }

    /// Cheaper preset for the dashboard preview check.
    pub fn dashboard_preview() -> Self {
        Self {
            debounce_ms: PREVIEW_DEBOUNCE_MS,
            min_check_chars: PREVIEW_MIN_CHECK_CHARS,
            include_style: false,
            recheck_after_apply: false,
            ..Self::editor()
        }
    }

    /// Parses overrides from JSON; missing fields take editor defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_check_chars == 0 {
            return Err(ConfigError::Invalid("min_check_chars must be at least 1"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Configuration load/validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid engine config: {message}"),
            Self::Invalid(details) => write!(f, "invalid engine config: {details}"),
        }
    }
}

impl Error for ConfigError {}
