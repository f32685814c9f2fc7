//! Accept loop for one configured tunnel entry point

use crate::intake::{IntakeSender, PendingTunnel};
use crate::observer::RelayObserver;
use crate::shutdown::ShutdownReceiver;
use crate::RelayError;
use portgate_proto::TunnelSpec;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind the spec's local address and accept connections until the shutdown
/// signal fires or accepting fails.
///
/// Each accepted connection is wrapped into a [`PendingTunnel`] and pushed
/// onto the intake queue; a full queue blocks the loop until the dispatcher
/// catches up. Shutdown while blocked in accept or push is a clean stop,
/// not an error; the listening socket closes when this returns. Any other
/// accept failure is reported to the caller, which decides whether it takes
/// the rest of the relay down.
pub async fn run(
    spec: TunnelSpec,
    intake: IntakeSender,
    mut shutdown: ShutdownReceiver,
    observer: Arc<dyn RelayObserver>,
) -> Result<(), RelayError> {
    let listener = TcpListener::bind(spec.bind_addr())
        .await
        .map_err(|e| RelayError::BindError {
            address: spec.local_addr.clone(),
            reason: e.to_string(),
        })?;
    let local_addr = listener.local_addr()?;
    observer.listener_started(&spec, local_addr);

    let result = accept_loop(&listener, &spec, &intake, &mut shutdown, observer.as_ref()).await;

    observer.listener_stopped(&spec, local_addr);
    result
}

async fn accept_loop(
    listener: &TcpListener,
    spec: &TunnelSpec,
    intake: &IntakeSender,
    shutdown: &mut ShutdownReceiver,
    observer: &dyn RelayObserver,
) -> Result<(), RelayError> {
    loop {
        let (upstream, peer_addr) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    return Err(RelayError::AcceptError {
                        address: spec.local_addr.clone(),
                        reason: e.to_string(),
                    })
                }
            },
        };

        observer.connection_accepted(spec, peer_addr);

        let pending = PendingTunnel {
            upstream,
            peer_addr,
            spec: spec.clone(),
        };
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            sent = intake.send(pending) => {
                // A closed queue means the dispatcher is gone; stop cleanly.
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
