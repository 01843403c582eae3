//! Online/offline state.
//!
//! The proxy reports the outcome of every network fetch here: a response of any
//! status means we are online, a transport error means we are offline. The
//! front end subscribes to show or hide its offline banner.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribers are only woken when the state actually flips.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
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
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_online() {
        assert!(Connectivity::default().is_online());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let connectivity = Connectivity::new(true);
        let mut rx = connectivity.subscribe();

        connectivity.set_online(false);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert!(!connectivity.is_online());
    }

    #[tokio::test]
    async fn test_repeated_state_does_not_notify() {
        let connectivity = Connectivity::new(true);
        let mut rx = connectivity.subscribe();
        rx.borrow_and_update();

        connectivity.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }
}
