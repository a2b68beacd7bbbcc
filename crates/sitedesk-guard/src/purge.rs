//! Clearing client state when a session ends

use std::sync::Arc;
use std::time::Duration;

use sitedesk_core::{ClientWorkspace, IdentityStore, PurgeNotifier, UserIdentity};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::machine::PurgeReason;

/// Terminal notice shown once a session has been purged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeNotice {
    pub reason: PurgeReason,
    pub message: String,
}

impl PurgeNotice {
    pub fn new(reason: PurgeReason) -> Self {
        let message = match reason {
            PurgeReason::IdleTimeout => {
                "Your session expired after a period of inactivity and all session data \
                 was cleared. Sign in again to continue."
            }
            PurgeReason::SignOut => "You have been signed out and all session data was cleared.",
        };
        Self {
            reason,
            message: message.to_string(),
        }
    }
}

/// Clears the workspace and cached identity, then tells the backend
#[derive(Clone)]
pub struct PurgeExecutor {
    workspace: Arc<RwLock<ClientWorkspace>>,
    identity_store: Option<IdentityStore>,
    notifier: Arc<dyn PurgeNotifier>,
    in_flight: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PurgeExecutor {
    pub fn new(workspace: Arc<RwLock<ClientWorkspace>>, notifier: Arc<dyn PurgeNotifier>) -> Self {
        Self {
            workspace,
            identity_store: None,
            notifier,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Also discard the persisted identity on purge
    pub fn with_identity_store(mut self, store: IdentityStore) -> Self {
        self.identity_store = Some(store);
        self
    }

    pub fn workspace(&self) -> &Arc<RwLock<ClientWorkspace>> {
        &self.workspace
    }

    /// Purge client state for `identity`.
    ///
    /// Local clearing always completes. The backend notification runs as a
    /// detached task; its outcome is only logged.
    pub async fn execute(&self, identity: &UserIdentity, reason: PurgeReason) -> PurgeNotice {
        self.workspace.write().await.clear();
        debug!("Workspace cleared");

        if let Some(store) = &self.identity_store {
            if let Err(e) = store.clear() {
                warn!("Failed to remove cached identity at {:?}: {}", store.path(), e);
            }
        }

        let notifier = Arc::clone(&self.notifier);
        let identity = identity.clone();
        let handle = tokio::spawn(async move {
            match notifier.notify_purge(&identity).await {
                Ok(()) => debug!("Backend acknowledged purge for {}", identity.user_id),
                Err(e) => warn!("Purge notification for {} failed: {}", identity.user_id, e),
            }
        });
        *self.in_flight.lock().await = Some(handle);

        info!("Client session data purged ({:?})", reason);
        PurgeNotice::new(reason)
    }

    /// Give an in-flight backend notification up to `limit` to finish.
    ///
    /// For callers about to exit the runtime, which would otherwise cancel it.
    /// Returns true if nothing is left pending.
    pub async fn settle(&self, limit: Duration) -> bool {
        let Some(mut handle) = self.in_flight.lock().await.take() else {
            return true;
        };
        match tokio::time::timeout(limit, &mut handle).await {
            Ok(_) => true,
            Err(_) => {
                debug!("Purge notification still pending after {:?}", limit);
                handle.abort();
                false
            }
        }
    }
}
