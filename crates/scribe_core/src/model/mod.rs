//! Suggestion domain model shared by store, orchestrator and reconciliation.
//!
//! # Responsibility
//! - Define canonical suggestion records and their coordinate space.
//! - Keep category derivation a pure function of the suggestion kind.
//!
//! # Invariants
//! - Every pending suggestion is identified by a stable `SuggestionId`.
//! - Ranges are half-open char offsets into the plain-text projection.

pub mod suggestion;
