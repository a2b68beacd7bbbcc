//! Sitedesk Client - HTTP access to the Sitedesk backend
//!
//! Covers authentication, the purge notification sent when an idle session
//! is cleared, and the task/project/dashboard reads that fill the client
//! workspace.

pub mod client;
pub mod error;
pub mod query;

pub use client::{BackendClient, BackendConfig};
pub use error::{ClientError, Result};
pub use query::TaskQuery;
