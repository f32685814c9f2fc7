//! Lifecycle observability
//!
//! Components report lifecycle events to an observer passed in at
//! construction instead of logging through a process-wide singleton. The
//! default observer logs through `tracing`; tests inject recording
//! implementations to watch listeners and tunnels from the outside.

use portgate_proto::TunnelSpec;
use std::net::SocketAddr;
use tracing::info;

/// Receives lifecycle events from listeners, the dispatcher and tunnel
/// workers. All methods are no-ops by default so implementations only
/// override the events they care about.
pub trait RelayObserver: Send + Sync {
    /// A listener bound its local address and started accepting.
    fn listener_started(&self, _spec: &TunnelSpec, _local_addr: SocketAddr) {}

    /// A listener stopped accepting and closed its socket.
    fn listener_stopped(&self, _spec: &TunnelSpec, _local_addr: SocketAddr) {}

    /// A listener accepted an inbound connection.
    fn connection_accepted(&self, _spec: &TunnelSpec, _peer_addr: SocketAddr) {}

    /// A tunnel worker dialed the remote and both copy directions are live.
    fn tunnel_opened(&self, _spec: &TunnelSpec, _peer_addr: SocketAddr) {}

    /// A tunnel session ended and both connections are closed.
    /// `bytes_received` flowed from the accepted connection to the remote,
    /// `bytes_sent` the other way; a torn-down direction reads as 0.
    fn tunnel_closed(
        &self,
        _spec: &TunnelSpec,
        _peer_addr: SocketAddr,
        _bytes_received: u64,
        _bytes_sent: u64,
    ) {
    }
}

/// Default observer: logs lifecycle events through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl RelayObserver for TracingObserver {
    fn listener_started(&self, _spec: &TunnelSpec, local_addr: SocketAddr) {
        info!(addr = %local_addr, "listening for incoming connections");
    }

    fn listener_stopped(&self, _spec: &TunnelSpec, local_addr: SocketAddr) {
        info!(addr = %local_addr, "stopped listening for incoming connections");
    }

    fn connection_accepted(&self, _spec: &TunnelSpec, peer_addr: SocketAddr) {
        info!(addr = %peer_addr, "accepted incoming connection");
    }

    fn tunnel_opened(&self, spec: &TunnelSpec, peer_addr: SocketAddr) {
        info!(peer = %peer_addr, remote = %spec.remote_addr, "tunnel opened");
    }

    fn tunnel_closed(
        &self,
        spec: &TunnelSpec,
        peer_addr: SocketAddr,
        bytes_received: u64,
        bytes_sent: u64,
    ) {
        info!(
            peer = %peer_addr,
            remote = %spec.remote_addr,
            bytes_received,
            bytes_sent,
            "tunnel closed"
        );
    }
}
