//! User-input signals and the guard's subscription to them
//!
//! The UI surface owns an [`ActivitySource`] and emits a signal for every
//! pointer, keyboard, scroll or touch event. A guard subscribes when its
//! session is created and unsubscribes when the session is torn down.

use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Buffered signals per subscriber before older ones are dropped
const DEFAULT_CAPACITY: usize = 64;

/// Kind of user interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivitySignal {
    Pointer,
    Keyboard,
    Scroll,
    Touch,
}

/// Fan-out of input signals from the UI surface
#[derive(Debug, Clone)]
pub struct ActivitySource {
    tx: broadcast::Sender<ActivitySignal>,
}

impl Default for ActivitySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivitySource {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a signal; returns how many subscribers will see it
    pub fn emit(&self, signal: ActivitySignal) -> usize {
        trace!("Input signal: {:?}", signal);
        self.tx.send(signal).unwrap_or(0)
    }

    /// Start listening for signals
    pub fn subscribe(&self) -> ActivitySubscription {
        debug!("Activity listener subscribed");
        ActivitySubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live listener on an [`ActivitySource`]
#[derive(Debug)]
pub struct ActivitySubscription {
    rx: broadcast::Receiver<ActivitySignal>,
}

impl ActivitySubscription {
    /// Next signal, or `None` once the source is gone.
    ///
    /// Signals dropped because the listener fell behind only mean that there
    /// was more activity; the next retained signal is returned.
    pub async fn next(&mut self) -> Option<ActivitySignal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) => return Some(signal),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!("Activity listener skipped {} signals", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop listening
    pub fn unsubscribe(self) {
        debug!("Activity listener unsubscribed");
    }
}
