//! Sitedesk CLI library
//!
//! Configuration, one-shot commands and the interactive guarded session
//! behind the `sitedesk` binary.

pub mod commands;
pub mod config;
pub mod session;

pub use config::SitedeskConfig;
