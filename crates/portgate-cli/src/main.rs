//! Portgate CLI - forward local TCP ports to fixed remote addresses
//!
//! Each configured tunnel spec starts one listener; accepted connections
//! are relayed bidirectionally to the spec's remote address until either
//! side closes. The first SIGINT/SIGTERM stops accepting and lets open
//! tunnels drain; a second one exits immediately.

use anyhow::{bail, Context, Result};
use clap::Parser;
use portgate_relay::{ListenerPolicy, Relay, RelayConfig, DEFAULT_INTAKE_CAPACITY};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

/// Relay TCP connections from local addresses to remote targets
#[derive(Parser, Debug)]
#[command(name = "portgate")]
#[command(about = "Relay TCP connections from local addresses to remote targets", long_about = None)]
struct Cli {
    /// Tunnel spec, repeatable (format: LOCAL_ADDR>REMOTE_ADDR,
    /// e.g. 0.0.0.0:9090>postgres:5432). TUNNEL_1, TUNNEL_2, ...
    /// environment variables are read as well.
    #[arg(long = "tunnel", value_name = "LOCAL>REMOTE")]
    tunnels: Vec<String>,

    /// Capacity of the queue between listeners and the dispatcher;
    /// accepts block once it fills up
    #[arg(long, default_value_t = DEFAULT_INTAKE_CAPACITY)]
    intake_capacity: usize,

    /// Keep the remaining listeners running when one of them fails,
    /// instead of shutting the whole relay down
    #[arg(long)]
    isolate_listeners: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "PORTGATE_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let specs = config::resolve_specs(&cli.tunnels);
    if specs.is_empty() {
        bail!("no tunnel configurations are set");
    }
    if cli.intake_capacity == 0 {
        bail!("intake capacity must be at least 1");
    }
    info!(count = specs.len(), "resolved tunnel configurations");

    let policy = if cli.isolate_listeners {
        ListenerPolicy::Isolate
    } else {
        ListenerPolicy::FailFast
    };
    let relay = Relay::new(
        RelayConfig::new(specs)
            .with_intake_capacity(cli.intake_capacity)
            .with_listener_policy(policy),
    );
    let shutdown = relay.shutdown_handle();

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutting down: no longer accepting connections, open tunnels drain");
        shutdown.trigger();
        // A second signal skips the drain.
        wait_for_signal().await;
        warn!("second signal received, exiting immediately");
        std::process::exit(130);
    });

    relay.run().await.context("failed to listen")?;
    Ok(())
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Handler installation only fails outside a tokio runtime.
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
