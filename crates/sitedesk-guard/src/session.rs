//! Session record with activity tracking

use std::time::Duration;

use sitedesk_core::UserIdentity;
use tokio::time::Instant;

/// Lifecycle of a guarded session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Signed in and recently active
    Active,
    /// Idle long enough to show the countdown
    Warned,
    /// Cleared; a new sign-in is required
    Purged,
}

/// One authenticated client session
#[derive(Debug, Clone)]
pub struct Session {
    identity: UserIdentity,
    /// Most recent input signal
    last_activity_at: Instant,
    state: SessionState,
    /// Only present while warned
    remaining: Option<Duration>,
}

impl Session {
    /// Create an active session for a freshly signed-in user
    pub fn new(identity: UserIdentity, now: Instant) -> Self {
        Self {
            identity,
            last_activity_at: now,
            state: SessionState::Active,
            remaining: None,
        }
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    pub fn remaining_millis(&self) -> Option<u64> {
        self.remaining
            .map(|r| u64::try_from(r.as_millis()).unwrap_or(u64::MAX))
    }

    /// Record activity. Purged sessions ignore it.
    pub fn touch(&mut self, now: Instant) {
        if self.state != SessionState::Purged {
            self.last_activity_at = now;
        }
    }

    /// Active -> Warned, with `remaining` left on the countdown
    pub fn warn(&mut self, remaining: Duration) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.state = SessionState::Warned;
        self.remaining = Some(remaining);
        true
    }

    /// Warned -> Active
    pub fn dismiss(&mut self) -> bool {
        if self.state != SessionState::Warned {
            return false;
        }
        self.state = SessionState::Active;
        self.remaining = None;
        true
    }

    /// Any live state -> Purged
    pub fn purge(&mut self) -> bool {
        if self.state == SessionState::Purged {
            return false;
        }
        self.state = SessionState::Purged;
        self.remaining = None;
        true
    }

    /// Take one step off the countdown, floored at zero
    pub fn tick(&mut self, step: Duration) -> Option<Duration> {
        if self.state != SessionState::Warned {
            return None;
        }
        let remaining = self.remaining.unwrap_or_default().saturating_sub(step);
        self.remaining = Some(remaining);
        Some(remaining)
    }

}

/// Countdown display, `MM:SS` with whole seconds
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
