//! Host online/offline signal: the trait and a manual implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// The host platform's own notion of connectivity, e.g. an OS network
/// interface flag.
///
/// Transitions pushed on the channel carry the new state (`true` = online).
/// Dropping the receiver unsubscribes. The signal is a hint that triggers an
/// immediate re-check; when a probe target is configured the probe outcome,
/// not the signal, decides the resulting status.
pub trait NativeSignal: Send + Sync {
    fn is_online(&self) -> bool;
    fn transitions(&self) -> broadcast::Receiver<bool>;
}

/// In-process [`NativeSignal`] flipped by [`set_online`](ManualSignal::set_online).
pub struct ManualSignal {
    online: AtomicBool,
    tx: broadcast::Sender<bool>,
}

impl ManualSignal {
    pub fn new(online: bool) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            online: AtomicBool::new(online),
            tx,
        }
    }

    /// Sets the state, notifying subscribers only on an actual change.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            let _ = self.tx.send(online);
        }
    }
}

impl Default for ManualSignal {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NativeSignal for ManualSignal {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn transitions(&self) -> broadcast::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl std::fmt::Debug for ManualSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualSignal")
            .field("online", &self.is_online())
            .finish()
    }
}
