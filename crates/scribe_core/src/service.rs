//! Collaborator contracts for the grammar-checking backend.
//!
//! # Responsibility
//! - Define request/response payloads for check and refine calls.
//! - Define the service traits a host implements (or drives asynchronously).
//! - Decode JSON wire payloads into typed responses.
//!
//! # Invariants
//! - Wire payloads use camelCase field names.
//! - Decoding failures surface as `ServiceError::InvalidResponse`.

use crate::model::suggestion::{SuggestionId, SuggestionKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Primary check request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub text: String,
    pub include_spelling: bool,
    pub include_grammar: bool,
    pub include_style: bool,
}

/// Suggestion as returned by the service, before id assignment and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSuggestion {
    /// Char offset where `original` starts in the checked text.
    pub start: usize,
    /// Exclusive char offset where `original` ends.
    pub end: usize,
    pub original: String,
    #[serde(alias = "suggestion", alias = "replacement")]
    pub proposed: String,
    #[serde(default, alias = "message")]
    pub explanation: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

/// Primary check response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    #[serde(default)]
    pub suggestions: Vec<RawSuggestion>,
}

/// Secondary path flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineMode {
    /// Improve the existing proposal.
    Refine,
    /// Produce an alternative proposal.
    Regenerate,
}

impl RefineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Refine => "refine",
            Self::Regenerate => "regenerate",
        }
    }
}

/// Single-suggestion refine/regenerate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineRequest {
    pub suggestion_id: SuggestionId,
    pub mode: RefineMode,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub original: String,
    pub proposed: String,
    /// Text surrounding `original`, trimmed to word boundaries.
    pub context: String,
}

/// Refine/regenerate response for one suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineResponse {
    #[serde(alias = "suggestion")]
    pub proposed: String,
    #[serde(default)]
    pub explanation: String,
}

/// Collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Caller is not entitled (signed out, plan limits).
    Auth(String),
    /// Transport failure.
    Network(String),
    /// No response within the configured bound.
    Timeout,
    /// Payload could not be decoded.
    InvalidResponse(String),
    Unknown(String),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth(message) => write!(f, "not authorized: {message}"),
            Self::Network(message) => write!(f, "network failure: {message}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::InvalidResponse(message) => write!(f, "invalid service response: {message}"),
            Self::Unknown(message) => write!(f, "service failure: {message}"),
        }
    }
}

impl ServiceError {
    /// Stable code for log lines; never carries the service message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Network(_) => "network",
            Self::Timeout => "timeout",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl Error for ServiceError {}

impl From<serde_json::Error> for ServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidResponse(value.to_string())
    }
}

/// Grammar-checking backend.
pub trait GrammarService {
    fn check(&self, request: &CheckRequest) -> Result<CheckResponse, ServiceError>;
}

/// Higher-latency single-suggestion backend.
pub trait RefineService {
    fn refine(&self, request: &RefineRequest) -> Result<RefineResponse, ServiceError>;
}

/// Decodes a check response body.
pub fn decode_check_response(body: &str) -> Result<CheckResponse, ServiceError> {
    Ok(serde_json::from_str(body)?)
}

/// Decodes a refine/regenerate response body.
pub fn decode_refine_response(body: &str) -> Result<RefineResponse, ServiceError> {
    Ok(serde_json::from_str(body)?)
}

/// Encodes a check request body.
pub fn encode_check_request(request: &CheckRequest) -> Result<String, ServiceError> {
    serde_json::to_string(request).map_err(|err| ServiceError::Unknown(err.to_string()))
}
