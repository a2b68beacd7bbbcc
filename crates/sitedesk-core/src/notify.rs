//! Seam for telling the backend that a session was purged

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::UserIdentity;

/// Receiver of best-effort purge notifications
///
/// Callers never act on the outcome beyond logging it: the client-side purge
/// has already happened by the time this is invoked.
#[async_trait]
pub trait PurgeNotifier: Send + Sync {
    /// Ask the backend to discard server-side state for `identity`
    async fn notify_purge(&self, identity: &UserIdentity) -> Result<()>;
}
