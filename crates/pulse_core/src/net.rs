//! Connectivity monitor
//!
//! Authoritative online/offline signal for the sync core. The platform's
//! reachability events are fed in through [`ConnectivityMonitor::set_online`];
//! everything else only observes. When the platform cannot report
//! connectivity at all, the monitor stays at its optimistic default of
//! online.

use tokio::sync::watch;

/// Observable online/offline status.
///
/// Cloning the monitor clones a handle onto the same underlying signal, so
/// repositories and the sync engine all see one status.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the optimistic default status (online).
    pub fn new() -> Self {
        Self::with_status(true)
    }

    /// Create a monitor with a known initial status.
    pub fn with_status(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    /// Last known reachability status.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Feed a platform reachability event. Subscribers are only woken on
    /// actual transitions, not on every report.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current != online {
                tracing::info!(online, "Connectivity changed");
                *current = online;
                true
            } else {
                false
            }
        });
    }

    /// Subscribe to status changes. The current status is immediately
    /// visible to a new subscriber (replay-of-one), and each transition is
    /// observable afterwards.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_to_online() {
        let monitor = ConnectivityMonitor::new();
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_replay_of_one() {
        let monitor = ConnectivityMonitor::with_status(false);
        let rx = monitor.subscribe();
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn test_emits_on_transition_only() {
        let monitor = ConnectivityMonitor::new();
        let mut rx = monitor.subscribe();

        // Repeating the current status is not a transition.
        monitor.set_online(true);
        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), rx.changed()).await.is_err();
        assert!(timed_out);

        monitor.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_clones_share_status() {
        let monitor = ConnectivityMonitor::new();
        let other = monitor.clone();
        monitor.set_online(false);
        assert!(!other.is_online());
    }
}
