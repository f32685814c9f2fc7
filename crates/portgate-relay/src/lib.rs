//! TCP port-forwarding relay
//!
//! Accepts connections on configured local addresses and relays each one
//! bidirectionally to its fixed remote address. Listeners feed a bounded
//! intake queue drained by a single dispatcher, which spawns one tunnel
//! worker per accepted connection. A shared shutdown signal stops admission
//! of new connections while tunnels that are already open drain naturally.

pub mod dispatcher;
pub mod intake;
pub mod listener;
pub mod observer;
pub mod relay;
pub mod shutdown;
pub mod tunnel;

pub use intake::{intake_queue, IntakeReceiver, IntakeSender, PendingTunnel, DEFAULT_INTAKE_CAPACITY};
pub use observer::{RelayObserver, TracingObserver};
pub use relay::{ListenerPolicy, Relay, RelayConfig};
pub use shutdown::{ShutdownReceiver, ShutdownSignal};

use thiserror::Error;

/// Relay errors
///
/// Bind and accept failures belong to a listener and may take the whole
/// relay down depending on policy; dial and I/O failures belong to a single
/// session and never propagate beyond it.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to bind to {address}: {reason}")]
    BindError { address: String, reason: String },

    #[error("failed to accept incoming connection on {address}: {reason}")]
    AcceptError { address: String, reason: String },

    #[error("failed to dial {address}: {reason}")]
    DialError { address: String, reason: String },
}
