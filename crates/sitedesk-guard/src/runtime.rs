//! Running a guard on the tokio clock
//!
//! One task owns the [`IdleGuard`]. It sleeps until the next deadline, wakes
//! for input signals and commands from [`SessionGuard`] handles, and publishes
//! a [`GuardSnapshot`] after every change. Due deadlines are always fired
//! before a command is applied, so a late command never resurrects a session
//! whose deadline already passed.

use std::future;

use sitedesk_core::UserIdentity;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error};

use crate::activity::{ActivitySignal, ActivitySubscription};
use crate::config::GuardConfig;
use crate::error::Result;
use crate::machine::{GuardEvent, GuardSnapshot, IdleGuard, PurgeReason};
use crate::purge::{PurgeExecutor, PurgeNotice};
use crate::session::SessionState;

/// Guard events buffered per subscriber
const EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
enum GuardCommand {
    Activity,
    KeepActive,
    PurgeNow,
}

/// Handle to a running guard
pub struct SessionGuard {
    commands: mpsc::UnboundedSender<GuardCommand>,
    snapshot: watch::Receiver<GuardSnapshot>,
    events: broadcast::Sender<GuardEvent>,
    task: JoinHandle<Option<PurgeNotice>>,
}

impl SessionGuard {
    /// Start guarding a session for `identity`, armed from now.
    ///
    /// `activity` is the guard's input subscription; it is released when the
    /// session is torn down.
    pub fn spawn(
        identity: UserIdentity,
        config: GuardConfig,
        activity: ActivitySubscription,
        executor: PurgeExecutor,
    ) -> Result<Self> {
        config.validate()?;

        let guard = IdleGuard::new(identity, config, Instant::now());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(guard.snapshot());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        debug!(
            "Guarding session for {} (warn after {:?}, purge after {:?})",
            guard.session().identity().email,
            config.warn_offset,
            config.purge_offset
        );

        let task = tokio::spawn(run(
            guard,
            command_rx,
            activity,
            snapshot_tx,
            events.clone(),
            executor,
        ));

        Ok(Self {
            commands,
            snapshot,
            events,
            task,
        })
    }

    /// Record user activity; returns false once the guard has stopped
    pub fn register_activity(&self) -> bool {
        self.commands.send(GuardCommand::Activity).is_ok()
    }

    /// Dismiss the warning
    pub fn keep_active(&self) -> bool {
        self.commands.send(GuardCommand::KeepActive).is_ok()
    }

    /// Purge right away, e.g. on sign-out
    pub fn purge_now(&self) -> bool {
        self.commands.send(GuardCommand::PurgeNow).is_ok()
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        *self.snapshot.borrow()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    pub fn remaining_millis(&self) -> Option<u64> {
        self.snapshot.borrow().remaining_millis
    }

    /// Watch snapshots as they change
    pub fn watch(&self) -> watch::Receiver<GuardSnapshot> {
        self.snapshot.clone()
    }

    /// Receive events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<GuardEvent> {
        self.events.subscribe()
    }

    /// Wait until the session is purged.
    ///
    /// Returns `None` if the guard stopped without purging.
    pub async fn purged(&self) -> Option<PurgeReason> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| s.state == SessionState::Purged)
            .await
            .ok()?;
        snapshot.purge_reason
    }

    /// Wait for the session to be purged and return the terminal notice
    pub async fn join(self) -> Option<PurgeNotice> {
        let Self { commands, task, .. } = self;
        let notice = finish(task).await;
        drop(commands);
        notice
    }

    /// Stop guarding without purging.
    ///
    /// Returns the notice if the session had already been purged.
    pub async fn shutdown(self) -> Option<PurgeNotice> {
        let Self { commands, task, .. } = self;
        drop(commands);
        finish(task).await
    }
}

async fn finish(task: JoinHandle<Option<PurgeNotice>>) -> Option<PurgeNotice> {
    match task.await {
        Ok(notice) => notice,
        Err(e) => {
            error!("Session guard task failed: {}", e);
            None
        }
    }
}

/// Sleep until `deadline`, or forever when nothing is pending
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => future::pending().await,
    }
}

/// Why the guard task woke up
enum Wake {
    Command(Option<GuardCommand>),
    Input(Option<ActivitySignal>),
    Deadline,
}

async fn run(
    mut guard: IdleGuard,
    mut commands: mpsc::UnboundedReceiver<GuardCommand>,
    mut activity: ActivitySubscription,
    snapshot: watch::Sender<GuardSnapshot>,
    events: broadcast::Sender<GuardEvent>,
    executor: PurgeExecutor,
) -> Option<PurgeNotice> {
    let mut listening = true;

    loop {
        let wake = tokio::select! {
            cmd = commands.recv() => Wake::Command(cmd),
            signal = activity.next(), if listening => Wake::Input(signal),
            _ = sleep_until(guard.next_deadline()) => Wake::Deadline,
        };

        let now = Instant::now();
        let mut emitted = guard.advance(now);

        if guard.state() != SessionState::Purged {
            match wake {
                Wake::Command(Some(GuardCommand::Activity)) | Wake::Input(Some(_)) => {
                    guard.register_activity(now);
                }
                Wake::Command(Some(GuardCommand::KeepActive)) => {
                    emitted.extend(guard.keep_active(now));
                }
                Wake::Command(Some(GuardCommand::PurgeNow)) => {
                    emitted.extend(guard.purge_now());
                }
                Wake::Command(None) => {
                    debug!("All guard handles dropped, stopping without purge");
                    activity.unsubscribe();
                    return None;
                }
                Wake::Input(None) => {
                    debug!("Activity source closed");
                    listening = false;
                }
                Wake::Deadline => {}
            }
        }

        if let Some(reason) = guard.purge_reason() {
            activity.unsubscribe();
            let notice = executor.execute(guard.session().identity(), reason).await;
            publish(&guard, &snapshot, &events, emitted);
            return Some(notice);
        }

        publish(&guard, &snapshot, &events, emitted);
    }
}

fn publish(
    guard: &IdleGuard,
    snapshot: &watch::Sender<GuardSnapshot>,
    events: &broadcast::Sender<GuardEvent>,
    emitted: Vec<GuardEvent>,
) {
    snapshot.send_replace(guard.snapshot());
    for event in emitted {
        // no subscribers is fine
        let _ = events.send(event);
    }
}
