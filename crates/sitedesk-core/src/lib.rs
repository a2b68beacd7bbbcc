//! Sitedesk Core - shared types for the Sitedesk client
//!
//! This crate provides:
//! - Identity and credential types returned by the backend
//! - Task, project and dashboard payloads
//! - The session-dependent client workspace (cleared on purge)
//! - The persisted identity store
//! - The purge notification seam implemented by the backend client

pub mod error;
pub mod identity;
pub mod notify;
pub mod project;
pub mod task;
pub mod workspace;

pub use error::{Error, Result};
pub use identity::{Credentials, IdentityStore, SessionToken, SignUpRequest, UserIdentity};
pub use notify::PurgeNotifier;
pub use project::Project;
pub use task::{
    Board, Dashboard, Priority, PriorityBreakdown, StatusBreakdown, Task, TaskDraft, TaskFilter,
    TaskStatus, TaskUpdate, DEFAULT_CATEGORIES, DEFAULT_TRADES, MAX_TITLE_LEN,
};
pub use workspace::ClientWorkspace;
