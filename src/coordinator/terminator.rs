use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, Sender};
use tracing::{debug, warn};

use crate::observability::metrics::get_metrics;
use crate::store::CredentialStore;
use crate::utils::channel;

/// Session lifecycle notifications for the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// login or register stored a new pair
    Established,
    /// refresh impossible, the application must send the user back to sign-in
    Terminated,
    LoggedOut,
}

/// Ends a session that cannot be refreshed: clears the store once and tells subscribers.
#[derive(Clone)]
pub struct SessionTerminator {
    store: CredentialStore,
    terminated: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
}

impl SessionTerminator {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            terminated: Arc::new(AtomicBool::new(false)),
            events: channel::run(),
        }
    }

    /// Clears credentials and publishes `Terminated`. Only the first call after
    /// a session was (re)established does anything; returns whether this one did.
    pub fn terminate(&self) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            debug!("session already terminated");
            return false;
        }
        self.store.clear();
        warn!("session terminated, re-authentication required");
        get_metrics().session_terminations.inc();
        self.publish(SessionEvent::Terminated);
        true
    }

    /// A new pair was stored; the next failure may terminate again.
    pub fn rearm(&self) {
        self.terminated.store(false, Ordering::Release);
    }

    /// Local logout, nothing left to terminate.
    pub(crate) fn disarm(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event).map_err(|err| {
            debug!("session event {:?} had no receivers", err.0);
        });
    }
}
