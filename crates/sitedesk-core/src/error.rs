//! Error types for the Sitedesk core library

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Project not cached: {0}")]
    UnknownProject(Uuid),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("No data directory available for the identity store")]
    NoDataDir,

    #[error("Purge notification failed: {0}")]
    Notify(String),
}
