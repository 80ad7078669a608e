//! Shutdown coordination for the proxy.
//!
//! `main` owns one [`Shutdown`]; the signal listener triggers it and the
//! listener (plain or TLS) subscribes so it stops accepting and drains.
//! Open tunnels are not subscribers: they are drained separately through
//! the tunnel tracker.

use tokio::sync::broadcast;

/// Stop signal for the proxy listeners.
///
/// Cloning shares the channel, so the signal task and the integration
/// harness can trigger the same listeners.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for a listener's `with_graceful_shutdown` future.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop every subscribed listener. A no-op when none is running.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
