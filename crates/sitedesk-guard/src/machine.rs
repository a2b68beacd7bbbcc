//! Idle-session state machine
//!
//! [`IdleGuard`] owns the session record and its pending deadlines. It never
//! reads the clock itself: every operation takes the current instant, and
//! [`IdleGuard::advance`] fires whatever deadlines are due at that instant.
//! Warning and purge deadlines are measured from the last re-arming activity;
//! countdown ticks are scheduled from the warning deadline so a late wake-up
//! catches up instead of drifting.

use std::time::Duration;

use sitedesk_core::UserIdentity;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::GuardConfig;
use crate::session::{Session, SessionState};
use crate::timers::{PendingTimers, TimerKind};

/// Why a session was purged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurgeReason {
    /// The purge deadline passed without dismissal
    IdleTimeout,
    /// Explicit sign-out or other manual trigger
    SignOut,
}

/// Transitions and countdown updates, for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    /// Idle long enough; countdown started at `remaining`
    Warned { remaining: Duration },
    /// One countdown step
    Tick { remaining: Duration },
    /// User chose to keep the session
    Dismissed,
    /// Terminal
    Purged { reason: PurgeReason },
}

/// Read-only view for the warning banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardSnapshot {
    pub state: SessionState,
    /// Only present while warned
    pub remaining_millis: Option<u64>,
    /// Set once purged
    pub purge_reason: Option<PurgeReason>,
}

/// Session plus its deadlines
#[derive(Debug, Clone)]
pub struct IdleGuard {
    config: GuardConfig,
    session: Session,
    timers: PendingTimers,
    purge_reason: Option<PurgeReason>,
}

impl IdleGuard {
    /// Start guarding a new session, armed from `now`
    pub fn new(identity: UserIdentity, config: GuardConfig, now: Instant) -> Self {
        let mut timers = PendingTimers::new();
        timers.arm(now, &config);
        Self {
            config,
            session: Session::new(identity, now),
            timers,
            purge_reason: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn remaining_millis(&self) -> Option<u64> {
        self.session.remaining_millis()
    }

    pub fn purge_reason(&self) -> Option<PurgeReason> {
        self.purge_reason
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        GuardSnapshot {
            state: self.session.state(),
            remaining_millis: self.session.remaining_millis(),
            purge_reason: self.purge_reason,
        }
    }

    /// Earliest instant at which [`advance`](Self::advance) has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Record user input.
    ///
    /// Re-arms both deadlines only while active; returns whether it did. While
    /// warned the timestamp is updated but the deadlines stand until the
    /// warning is dismissed.
    pub fn register_activity(&mut self, now: Instant) -> bool {
        match self.session.state() {
            SessionState::Active => {
                self.session.touch(now);
                self.timers.arm(now, &self.config);
                true
            }
            SessionState::Warned => {
                self.session.touch(now);
                false
            }
            SessionState::Purged => false,
        }
    }

    /// Dismiss the warning and re-arm from `now`.
    ///
    /// While active this behaves like plain activity and emits nothing.
    pub fn keep_active(&mut self, now: Instant) -> Option<GuardEvent> {
        match self.session.state() {
            SessionState::Warned => {
                self.session.dismiss();
                self.timers.stop_countdown();
                self.register_activity(now);
                info!("Session kept active by {}", self.session.identity().email);
                Some(GuardEvent::Dismissed)
            }
            SessionState::Active => {
                self.register_activity(now);
                None
            }
            SessionState::Purged => None,
        }
    }

    /// Purge immediately, cancelling pending deadlines
    pub fn purge_now(&mut self) -> Option<GuardEvent> {
        self.purge(PurgeReason::SignOut)
    }

    /// Fire every deadline due at or before `now`, in order
    pub fn advance(&mut self, now: Instant) -> Vec<GuardEvent> {
        let mut events = Vec::new();

        while let Some((kind, at)) = self.timers.next_due(now) {
            self.timers.take(kind);
            match kind {
                TimerKind::Warning => {
                    let window = self.config.warning_window();
                    if self.session.warn(window) {
                        info!(
                            "Session for {} idle, purging in {}s unless kept active",
                            self.session.identity().email,
                            window.as_secs()
                        );
                        self.timers.schedule_tick(at + self.config.tick);
                        events.push(GuardEvent::Warned { remaining: window });
                    }
                }
                TimerKind::Countdown => {
                    if let Some(remaining) = self.session.tick(self.config.tick) {
                        debug!("Countdown: {}ms remaining", remaining.as_millis());
                        if !remaining.is_zero() {
                            self.timers.schedule_tick(at + self.config.tick);
                        }
                        events.push(GuardEvent::Tick { remaining });
                    }
                }
                TimerKind::Purge => {
                    if let Some(event) = self.purge(PurgeReason::IdleTimeout) {
                        events.push(event);
                    }
                    break;
                }
            }
        }

        events
    }

    fn purge(&mut self, reason: PurgeReason) -> Option<GuardEvent> {
        if !self.session.purge() {
            return None;
        }
        self.timers.cancel_all();
        self.purge_reason = Some(reason);
        info!("Session for {} purged ({:?})", self.session.identity().email, reason);
        Some(GuardEvent::Purged { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitedesk_core::SessionToken;

    const WARN: Duration = Duration::from_millis(480_000);
    const PURGE: Duration = Duration::from_millis(600_000);

    fn identity() -> UserIdentity {
        UserIdentity {
            user_id: "u-42".to_string(),
            email: "lin@example.com".to_string(),
            name: "Lin".to_string(),
            token: SessionToken::new("tok"),
        }
    }

    fn guard(t0: Instant) -> IdleGuard {
        IdleGuard::new(identity(), GuardConfig::new(WARN, PURGE), t0)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_warns_then_purges_on_schedule() {
        let t0 = Instant::now();
        let mut g = guard(t0);

        assert!(g.advance(t0 + ms(479_999)).is_empty());
        assert_eq!(g.state(), SessionState::Active);

        let events = g.advance(t0 + ms(480_000));
        assert_eq!(events, vec![GuardEvent::Warned { remaining: ms(120_000) }]);
        assert_eq!(g.remaining_millis(), Some(120_000));

        let events = g.advance(t0 + ms(599_999));
        assert_eq!(events.len(), 119);
        assert_eq!(g.state(), SessionState::Warned);
        assert_eq!(g.remaining_millis(), Some(1_000));

        let events = g.advance(t0 + ms(600_000));
        assert_eq!(
            events,
            vec![
                GuardEvent::Tick { remaining: Duration::ZERO },
                GuardEvent::Purged { reason: PurgeReason::IdleTimeout },
            ]
        );
        assert_eq!(g.state(), SessionState::Purged);
        assert_eq!(g.next_deadline(), None);
    }

    #[test]
    fn test_single_advance_past_everything() {
        let t0 = Instant::now();
        let mut g = guard(t0);

        let events = g.advance(t0 + ms(3_600_000));
        let warned = events.iter().filter(|e| matches!(e, GuardEvent::Warned { .. })).count();
        let ticks = events.iter().filter(|e| matches!(e, GuardEvent::Tick { .. })).count();
        assert_eq!(warned, 1);
        assert_eq!(ticks, 120);
        assert_eq!(events.last(), Some(&GuardEvent::Purged { reason: PurgeReason::IdleTimeout }));
        assert!(g.advance(t0 + ms(7_200_000)).is_empty());
    }

    #[test]
    fn test_activity_while_active_rearms() {
        let t0 = Instant::now();
        let mut g = guard(t0);

        assert!(g.register_activity(t0 + ms(400_000)));
        assert!(g.advance(t0 + ms(880_000 - 1)).is_empty());
        assert_eq!(g.state(), SessionState::Active);
        assert_eq!(g.session().last_activity_at(), t0 + ms(400_000));

        let events = g.advance(t0 + ms(880_000));
        assert!(matches!(events[..], [GuardEvent::Warned { .. }]));
    }

    #[test]
    fn test_activity_while_warned_does_not_extend() {
        let t0 = Instant::now();
        let mut g = guard(t0);
        g.advance(t0 + WARN);

        assert!(!g.register_activity(t0 + ms(500_000)));
        assert_eq!(g.session().last_activity_at(), t0 + ms(500_000));

        let events = g.advance(t0 + PURGE);
        assert_eq!(events.last(), Some(&GuardEvent::Purged { reason: PurgeReason::IdleTimeout }));
    }

    #[test]
    fn test_keep_active_restarts_cycle() {
        let t0 = Instant::now();
        let mut g = guard(t0);
        g.advance(t0 + ms(530_000));
        assert_eq!(g.state(), SessionState::Warned);

        let dismissed_at = t0 + ms(530_000);
        assert_eq!(g.keep_active(dismissed_at), Some(GuardEvent::Dismissed));
        assert_eq!(g.state(), SessionState::Active);
        assert_eq!(g.remaining_millis(), None);

        // the old purge deadline no longer applies
        assert!(g.advance(t0 + PURGE).is_empty());

        let events = g.advance(dismissed_at + WARN);
        assert_eq!(events, vec![GuardEvent::Warned { remaining: ms(120_000) }]);
    }

    #[test]
    fn test_keep_active_while_active_is_plain_activity() {
        let t0 = Instant::now();
        let mut g = guard(t0);
        assert_eq!(g.keep_active(t0 + ms(1_000)), None);
        assert_eq!(g.session().last_activity_at(), t0 + ms(1_000));
    }

    #[test]
    fn test_purge_now_from_any_live_state() {
        let t0 = Instant::now();
        let mut active = guard(t0);
        assert_eq!(
            active.purge_now(),
            Some(GuardEvent::Purged { reason: PurgeReason::SignOut })
        );
        assert_eq!(active.next_deadline(), None);
        assert_eq!(active.purge_now(), None);

        let mut warned = guard(t0);
        warned.advance(t0 + WARN);
        assert!(warned.purge_now().is_some());
        assert_eq!(warned.snapshot().purge_reason, Some(PurgeReason::SignOut));
        assert!(warned.advance(t0 + PURGE).is_empty());
    }

    #[test]
    fn test_purged_ignores_everything() {
        let t0 = Instant::now();
        let mut g = guard(t0);
        g.purge_now();

        assert!(!g.register_activity(t0 + ms(10)));
        assert_eq!(g.keep_active(t0 + ms(20)), None);
        assert_eq!(g.state(), SessionState::Purged);
    }
}
