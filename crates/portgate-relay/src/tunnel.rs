//! Per-connection relay session
//!
//! Dials the remote for one accepted connection and copies bytes in both
//! directions until either side closes or fails, then closes both
//! connections together.

use crate::intake::PendingTunnel;
use crate::observer::RelayObserver;
use crate::RelayError;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::debug;

/// Run one relay session to completion. Invoked once per accepted
/// connection, never reused.
///
/// The session ends as soon as either copy direction finishes, cleanly or
/// not. The other direction is then torn down and joined, so both
/// connections are closed and both copy tasks have returned before this
/// does. The reported result is the outcome of whichever direction finished
/// first; a dial failure closes the accepted connection and is reported
/// without opening a session.
pub async fn run(
    pending: PendingTunnel,
    observer: Arc<dyn RelayObserver>,
) -> Result<(), RelayError> {
    let PendingTunnel {
        upstream,
        peer_addr,
        spec,
    } = pending;

    let downstream = match TcpStream::connect(&spec.remote_addr).await {
        Ok(stream) => stream,
        Err(e) => {
            // The accepted connection must not outlive a failed dial.
            drop(upstream);
            return Err(RelayError::DialError {
                address: spec.remote_addr.clone(),
                reason: e.to_string(),
            });
        }
    };

    observer.tunnel_opened(&spec, peer_addr);

    let (mut upstream_read, mut upstream_write) = upstream.into_split();
    let (mut downstream_read, mut downstream_write) = downstream.into_split();

    let mut to_remote = tokio::spawn(async move {
        let copied = tokio::io::copy(&mut upstream_read, &mut downstream_write).await;
        // Forward the half-close so the remote sees EOF.
        let _ = downstream_write.shutdown().await;
        copied
    });
    let mut to_client = tokio::spawn(async move {
        let copied = tokio::io::copy(&mut downstream_read, &mut upstream_write).await;
        let _ = upstream_write.shutdown().await;
        copied
    });

    // Whichever direction finishes first ends the session; the other copy is
    // torn down and joined so both connections close together.
    let (result, bytes_received, bytes_sent) = tokio::select! {
        finished = &mut to_remote => {
            to_client.abort();
            let bytes_sent = join_copied(&mut to_client).await;
            let (bytes_received, result) = copy_outcome(finished);
            (result, bytes_received, bytes_sent)
        }
        finished = &mut to_client => {
            to_remote.abort();
            let bytes_received = join_copied(&mut to_remote).await;
            let (bytes_sent, result) = copy_outcome(finished);
            (result, bytes_received, bytes_sent)
        }
    };

    debug!(
        peer = %peer_addr,
        remote = %spec.remote_addr,
        bytes_received,
        bytes_sent,
        "relay session finished"
    );
    observer.tunnel_closed(&spec, peer_addr, bytes_received, bytes_sent);
    result
}

/// Join the remaining copy task; a torn-down direction reads as 0 bytes.
async fn join_copied(task: &mut JoinHandle<std::io::Result<u64>>) -> u64 {
    match task.await {
        Ok(Ok(copied)) => copied,
        _ => 0,
    }
}

fn copy_outcome(
    finished: Result<std::io::Result<u64>, tokio::task::JoinError>,
) -> (u64, Result<(), RelayError>) {
    match finished {
        Ok(Ok(copied)) => (copied, Ok(())),
        Ok(Err(e)) => (0, Err(RelayError::IoError(e))),
        Err(e) => (
            0,
            Err(RelayError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                e,
            ))),
        ),
    }
}
