use std::sync::Arc;
use tokio::sync::watch;

/// Shared "is online" flag.
///
/// Whatever observes the network (a health probe, an OS notification, a
/// failed request) calls [`set_online`](Self::set_online); the queue reads
/// the flag to decide whether to flush right after an enqueue and watches it
/// for offline-to-online transitions.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    /// Creates a flag with the given initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Creates a flag that starts online.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Creates a flag that starts offline.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Returns whether the client currently reports itself online.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Updates the flag. Watchers are only woken when the value changes.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Subscribes to changes of the flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}
