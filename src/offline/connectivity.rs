//! Connectivity Signal
//!
//! Online/offline state shared between whoever observes the network and the
//! offline sync task.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

// == Connectivity ==
/// Current online state plus a subscription point for transitions.
///
/// The host application calls [`Connectivity::set_online`] when its network
/// status changes; clones share the same state.
#[derive(Debug, Clone)]
pub struct Connectivity {
    state: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Records the current state. Subscribers are only notified on an
    /// actual transition; returns whether one happened.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }

    /// Receiver that wakes on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
