//! Bounded hand-off queue between listeners and the dispatcher
//!
//! The queue is the only resource shared across concurrent components. It is
//! a bounded mpsc channel: many listeners push, the single dispatcher pops.
//! A full queue blocks the pushing listener, which is what throttles accepts
//! when dispatch falls behind.

use portgate_proto::TunnelSpec;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Default capacity of the intake queue.
pub const DEFAULT_INTAKE_CAPACITY: usize = 5;

/// An accepted connection waiting to be handed to a tunnel worker.
///
/// Owned by the intake queue until dequeued and consumed exactly once by the
/// dispatcher.
#[derive(Debug)]
pub struct PendingTunnel {
    /// The accepted local connection.
    pub upstream: TcpStream,
    /// Peer address of the accepted connection.
    pub peer_addr: SocketAddr,
    /// The spec whose listener accepted this connection.
    pub spec: TunnelSpec,
}

/// Producing half of the intake queue, held by each listener.
pub type IntakeSender = mpsc::Sender<PendingTunnel>;

/// Consuming half of the intake queue, held by the dispatcher.
pub type IntakeReceiver = mpsc::Receiver<PendingTunnel>;

/// Create the bounded intake queue. Strict FIFO; `send` blocks while full,
/// `recv` blocks while empty, and both report closure once the other side
/// is gone.
pub fn intake_queue(capacity: usize) -> (IntakeSender, IntakeReceiver) {
    mpsc::channel(capacity)
}
