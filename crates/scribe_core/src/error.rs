//! Document-wide check error taxonomy.
//!
//! # Responsibility
//! - Classify primary check failures into display-distinct kinds.
//! - Carry the user-facing message the host renders next to the retry action.
//!
//! # Invariants
//! - `auth` failures never share a message with transient failures.
//! - Error values never embed document text.

use crate::service::ServiceError;
use std::error::Error;
use std::fmt::{Display, Formatter};

const AUTH_MESSAGE: &str = "Sign in again to keep checking your writing.";
const NETWORK_MESSAGE: &str = "Could not reach the writing checker. Check your connection and retry.";
const TIMEOUT_MESSAGE: &str = "The writing checker took too long to respond. Please retry.";
const DRIFT_MESSAGE: &str =
    "This text changed after the suggestion was made. Dismiss it or wait for the next check.";
const UNKNOWN_MESSAGE: &str = "Something went wrong while checking your writing. Please retry.";

/// Error kind exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckErrorKind {
    /// Caller is not entitled or is signed out.
    Auth,
    /// Call failed in transport or timed out.
    Network,
    /// Input or state rejected by a local consistency check.
    Validation,
    Unknown,
}

impl CheckErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }
}

/// Current document-wide check error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckError {
    pub kind: CheckErrorKind,
    /// Human-readable message for the host.
    pub message: String,
}

impl CheckError {
    pub fn new(kind: CheckErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error surfaced when an in-flight request exceeded its time bound.
    pub fn timeout() -> Self {
        Self::new(CheckErrorKind::Network, TIMEOUT_MESSAGE)
    }

    /// Apply rejected because the text under the suggestion no longer matches.
    pub fn drift() -> Self {
        Self::new(CheckErrorKind::Validation, DRIFT_MESSAGE)
    }

    pub fn is_auth(&self) -> bool {
        self.kind == CheckErrorKind::Auth
    }
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

impl Error for CheckError {}

impl From<&ServiceError> for CheckError {
    fn from(value: &ServiceError) -> Self {
        match value {
            ServiceError::Auth(_) => Self::new(CheckErrorKind::Auth, AUTH_MESSAGE),
            ServiceError::Network(_) => Self::new(CheckErrorKind::Network, NETWORK_MESSAGE),
            ServiceError::Timeout => Self::timeout(),
            ServiceError::InvalidResponse(_) | ServiceError::Unknown(_) => {
                Self::new(CheckErrorKind::Unknown, UNKNOWN_MESSAGE)
            }
        }
    }
}
