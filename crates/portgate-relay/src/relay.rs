//! Relay orchestration
//!
//! Wires listeners, the intake queue and the dispatcher together and
//! supervises listener lifecycles.

use crate::dispatcher;
use crate::intake::{self, DEFAULT_INTAKE_CAPACITY};
use crate::listener;
use crate::observer::{RelayObserver, TracingObserver};
use crate::shutdown::ShutdownSignal;
use crate::RelayError;
use portgate_proto::TunnelSpec;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, warn};

/// What happens to the rest of the relay when one listener fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerPolicy {
    /// A failed listener fires the shutdown signal and takes the whole
    /// relay down.
    #[default]
    FailFast,
    /// A failed listener is logged; the others keep serving.
    Isolate,
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// One listener is started per spec.
    pub specs: Vec<TunnelSpec>,
    /// Capacity of the intake queue between listeners and the dispatcher.
    pub intake_capacity: usize,
    /// Listener failure escalation policy.
    pub listener_policy: ListenerPolicy,
}

impl RelayConfig {
    pub fn new(specs: Vec<TunnelSpec>) -> Self {
        Self {
            specs,
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            listener_policy: ListenerPolicy::default(),
        }
    }

    pub fn with_intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    pub fn with_listener_policy(mut self, policy: ListenerPolicy) -> Self {
        self.listener_policy = policy;
        self
    }
}

/// The assembled relay: N listeners, one intake queue, one dispatcher.
pub struct Relay {
    config: RelayConfig,
    observer: Arc<dyn RelayObserver>,
    shutdown: ShutdownSignal,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            observer: Arc::new(TracingObserver),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Replace the default tracing observer.
    pub fn with_observer(mut self, observer: Arc<dyn RelayObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Handle that fires this relay's shutdown signal.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run until every listener has stopped and in-flight tunnels have
    /// drained. Returns the first listener error, if any.
    ///
    /// Under [`ListenerPolicy::FailFast`] a single listener failure fires
    /// the shutdown signal, stopping every other listener and the
    /// dispatcher's admission loop; sessions that are already open still
    /// drain. Under [`ListenerPolicy::Isolate`] the failure is recorded and
    /// the remaining listeners keep serving until the shutdown handle is
    /// triggered externally.
    pub async fn run(self) -> Result<(), RelayError> {
        let Relay {
            config,
            observer,
            shutdown,
        } = self;

        let (intake_tx, intake_rx) = intake::intake_queue(config.intake_capacity);

        let dispatcher = tokio::spawn(dispatcher::run(
            intake_rx,
            shutdown.subscribe(),
            observer.clone(),
        ));

        let mut listeners = JoinSet::new();
        for spec in config.specs {
            listeners.spawn(listener::run(
                spec,
                intake_tx.clone(),
                shutdown.subscribe(),
                observer.clone(),
            ));
        }
        // The dispatcher sees a closed queue once the last listener is gone.
        drop(intake_tx);

        let mut first_error = None;
        while let Some(joined) = listeners.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(e) => Some(RelayError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e,
                ))),
            };
            if let Some(e) = failure {
                error!("listener failed: {e}");
                if config.listener_policy == ListenerPolicy::FailFast {
                    shutdown.trigger();
                }
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if let Err(e) = dispatcher.await {
            warn!("dispatcher task failed: {e}");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
