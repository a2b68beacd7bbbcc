//! Error types for the session guard

use thiserror::Error;

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

/// Errors that can occur when setting up a guard
///
/// Once running, the guard has no fallible operations: a failed purge
/// notification is logged and otherwise ignored.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Timing configuration rejected
    #[error("Invalid guard configuration: {0}")]
    InvalidConfig(String),
}
