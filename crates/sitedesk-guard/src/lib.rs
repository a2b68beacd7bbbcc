//! Sitedesk Guard - idle-session guard for the Sitedesk client
//!
//! This crate provides:
//! - Activity tracking with an explicit subscribe/unsubscribe lifecycle
//! - A warning deadline that starts a once-per-second countdown
//! - A purge deadline that clears the client workspace and notifies the backend
//! - A tokio task that owns all of the above and publishes snapshots
//!
//! The timing rules live in [`IdleGuard`], a synchronous state machine driven
//! by explicit instants. [`SessionGuard`] runs it on the tokio clock.

pub mod activity;
pub mod config;
pub mod error;
pub mod machine;
pub mod purge;
pub mod runtime;
pub mod session;
pub mod timers;

pub use activity::{ActivitySignal, ActivitySource, ActivitySubscription};
pub use config::GuardConfig;
pub use error::{GuardError, Result};
pub use machine::{GuardEvent, GuardSnapshot, IdleGuard, PurgeReason};
pub use purge::{PurgeExecutor, PurgeNotice};
pub use runtime::SessionGuard;
pub use session::{format_countdown, Session, SessionState};
pub use timers::{PendingTimers, TimerKind};
