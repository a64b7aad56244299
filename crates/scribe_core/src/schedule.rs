//! Debounce and single-flight primitives driven by an injected clock.
//!
//! # Responsibility
//! - Collapse bursts of calls into the last one after a quiet window.
//! - Hand out monotonically increasing request tokens and recognize stale ones.
//!
//! # Invariants
//! - Rescheduling always cancels the previous pending value.
//! - Only the most recently issued token is ever considered current.

use std::time::{Duration, Instant};

/// Cancel-and-restart timer holding the latest pending value.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces any pending value and restarts the quiet window at `now`.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Drops the pending value, if any.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due_at)| *due_at)
    }

    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }

    /// Returns the pending value once its quiet window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due_at = self.due_at()?;
        if now < due_at {
            return None;
        }
        self.cancel()
    }
}

/// Identifier of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Token source; every issued token supersedes the previous one.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    issued: u64,
    latest: Option<RequestToken>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new token and marks it as the latest.
    pub fn issue(&mut self) -> RequestToken {
        self.issued += 1;
        let token = RequestToken(self.issued);
        self.latest = Some(token);
        token
    }

    /// Issues a token without making it the latest one.
    ///
    /// Used by per-item requests tracked outside this guard.
    pub fn issue_detached(&mut self) -> RequestToken {
        self.issued += 1;
        RequestToken(self.issued)
    }

    pub fn latest(&self) -> Option<RequestToken> {
        self.latest
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest == Some(token)
    }

    /// Settles `token` if it is current; returns whether it was.
    pub fn settle(&mut self, token: RequestToken) -> bool {
        if self.is_current(token) {
            self.latest = None;
            return true;
        }
        false
    }

    /// Forgets the current token so any in-flight completion becomes stale.
    pub fn invalidate(&mut self) {
        self.latest = None;
    }
}
