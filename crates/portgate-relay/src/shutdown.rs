//! Process-wide cancellation signal
//!
//! One signal is shared by every listener and the dispatcher. Firing it
//! stops admission of new connections; tunnels that are already open are
//! never interrupted and drain naturally.

use std::sync::Arc;
use tokio::sync::watch;

/// Trigger handle for the shared shutdown signal.
///
/// Cloneable so the relay, the CLI signal handler and tests can all hold
/// one. Firing is idempotent.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Every subscriber unblocks; later calls are no-ops.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create a receiver for one component.
    pub fn subscribe(&self) -> ShutdownReceiver {
        ShutdownReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownReceiver {
    rx: watch::Receiver<bool>,
}

impl ShutdownReceiver {
    /// Wait until the signal fires. Returns immediately if it already has.
    /// A dropped trigger handle counts as fired.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}
