//! Intake queue consumer
//!
//! Drains the intake queue and spawns one tunnel worker per accepted
//! connection.

use crate::intake::IntakeReceiver;
use crate::observer::RelayObserver;
use crate::shutdown::ShutdownReceiver;
use crate::tunnel;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Drain the intake queue until it closes or the shutdown signal fires,
/// spawning one tunnel worker per pending connection.
///
/// Workers are fire-and-forget from the admission loop's point of view: the
/// loop never blocks on a session and worker errors are logged here, never
/// propagated. Each queue item is consumed exactly once, so each accepted
/// connection gets exactly one worker. Once admission stops, in-flight
/// tunnels are left to drain naturally before this returns.
pub async fn run(
    mut intake: IntakeReceiver,
    mut shutdown: ShutdownReceiver,
    observer: Arc<dyn RelayObserver>,
) {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            pending = intake.recv() => match pending {
                Some(pending) => {
                    let peer_addr = pending.peer_addr;
                    let remote_addr = pending.spec.remote_addr.clone();
                    let observer = observer.clone();
                    sessions.spawn(async move {
                        if let Err(e) = tunnel::run(pending, observer).await {
                            error!(peer = %peer_addr, remote = %remote_addr, "tunnel failed: {e}");
                        }
                    });
                }
                None => break,
            },
            // Reap finished sessions so the set does not grow with history.
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }

    debug!(in_flight = sessions.len(), "dispatcher stopped admitting tunnels");
    while sessions.join_next().await.is_some() {}
}
