//! Pending deadlines owned by a guard
//!
//! Each slot holds at most one deadline, so there is never more than one
//! warning, purge or countdown tick pending at a time.

use tokio::time::Instant;

use crate::config::GuardConfig;

/// Kinds of deadline, in the order they fire when due at the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    Warning,
    Countdown,
    Purge,
}

#[derive(Debug, Clone, Default)]
pub struct PendingTimers {
    warning: Option<Instant>,
    countdown: Option<Instant>,
    purge: Option<Instant>,
}

impl PendingTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel everything and schedule fresh warning and purge deadlines
    pub fn arm(&mut self, now: Instant, config: &GuardConfig) {
        self.cancel_all();
        self.warning = Some(now + config.warn_offset);
        self.purge = Some(now + config.purge_offset);
    }

    pub fn cancel_all(&mut self) {
        self.warning = None;
        self.countdown = None;
        self.purge = None;
    }

    pub fn schedule_tick(&mut self, at: Instant) {
        self.countdown = Some(at);
    }

    pub fn stop_countdown(&mut self) {
        self.countdown = None;
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        match kind {
            TimerKind::Warning => self.warning,
            TimerKind::Countdown => self.countdown,
            TimerKind::Purge => self.purge,
        }
    }

    /// Remove a deadline, returning it if it was pending
    pub fn take(&mut self, kind: TimerKind) -> Option<Instant> {
        match kind {
            TimerKind::Warning => self.warning.take(),
            TimerKind::Countdown => self.countdown.take(),
            TimerKind::Purge => self.purge.take(),
        }
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.warning, self.countdown, self.purge]
            .into_iter()
            .flatten()
            .min()
    }

    /// The deadline that should fire next if it is due at `now`
    pub fn next_due(&self, now: Instant) -> Option<(TimerKind, Instant)> {
        [TimerKind::Warning, TimerKind::Countdown, TimerKind::Purge]
            .into_iter()
            .filter_map(|kind| self.deadline(kind).map(|at| (kind, at)))
            .filter(|(_, at)| *at <= now)
            .min_by_key(|(kind, at)| (*at, *kind))
    }
}
