//! Component-level tests for the relay building blocks
//!
//! These exercise the listener, intake queue, dispatcher and tunnel worker
//! contracts directly against real sockets.

use portgate_proto::TunnelSpec;
use portgate_relay::{
    dispatcher, intake_queue, listener, tunnel, PendingTunnel, RelayError, RelayObserver,
    ShutdownSignal,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn init_tracing() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();
}

/// Observer that reports bound listener addresses over a channel.
struct StartedObserver {
    started: mpsc::UnboundedSender<(SocketAddr, String)>,
}

impl RelayObserver for StartedObserver {
    fn listener_started(&self, spec: &TunnelSpec, local_addr: SocketAddr) {
        let _ = self.started.send((local_addr, spec.remote_addr.clone()));
    }
}

struct NullObserver;

impl RelayObserver for NullObserver {}

/// Echo server on an ephemeral port. Echoes every connection until EOF,
/// then reports the close on the returned channel.
async fn spawn_echo_server() -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = closed_tx.send(());
            });
        }
    });
    (addr, closed_rx)
}

/// A client connection plus the matching accepted-side PendingTunnel,
/// targeting `remote`.
async fn accepted_pair(remote: SocketAddr) -> (TcpStream, PendingTunnel) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (upstream, peer_addr) = listener.accept().await.unwrap();
    let spec: TunnelSpec = format!("{addr}>{remote}").parse().unwrap();
    (
        client,
        PendingTunnel {
            upstream,
            peer_addr,
            spec,
        },
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn tunnel_round_trip_preserves_bytes() {
    init_tracing();
    let (echo_addr, _closed) = spawn_echo_server().await;
    let (mut client, pending) = accepted_pair(echo_addr).await;
    let worker = tokio::spawn(tunnel::run(pending, Arc::new(NullObserver)));

    client.write_all(b"hello through the tunnel").await.unwrap();
    let mut buf = [0u8; 24];
    timeout(Duration::from_secs(5), client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"hello through the tunnel");

    drop(client);
    let result = timeout(Duration::from_secs(5), worker)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok(), "clean EOF is not a session error: {result:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn dial_failure_closes_the_accepted_connection() {
    init_tracing();
    // An address nothing listens on: bind, take the port, drop the socket.
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = unused.local_addr().unwrap();
    drop(unused);

    let (mut client, pending) = accepted_pair(dead_addr).await;
    let result = timeout(
        Duration::from_secs(5),
        tunnel::run(pending, Arc::new(NullObserver)),
    )
    .await
    .unwrap();
    assert!(matches!(result, Err(RelayError::DialError { .. })));

    // The accepted side must observe the close.
    let mut buf = [0u8; 1];
    let read = timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .unwrap();
    assert!(matches!(read, Ok(0) | Err(_)), "expected closed connection");
}

#[tokio::test(flavor = "multi_thread")]
async fn client_close_also_closes_the_dialed_connection() {
    init_tracing();
    let (echo_addr, mut closed) = spawn_echo_server().await;
    let (mut client, pending) = accepted_pair(echo_addr).await;
    let worker = tokio::spawn(tunnel::run(pending, Arc::new(NullObserver)));

    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    timeout(Duration::from_secs(5), client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"ping");

    drop(client);
    // The echo handler reads EOF once the worker closes the dialed side.
    timeout(Duration::from_secs(5), closed.recv())
        .await
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(5), worker)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn full_intake_queue_blocks_accepts_without_losing_connections() {
    init_tracing();
    let (intake_tx, mut intake_rx) = intake_queue(1);
    let shutdown = ShutdownSignal::new();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let observer = Arc::new(StartedObserver {
        started: started_tx,
    });

    let spec: TunnelSpec = "127.0.0.1:0>127.0.0.1:1".parse().unwrap();
    let listener_task = tokio::spawn(listener::run(
        spec,
        intake_tx,
        shutdown.subscribe(),
        observer,
    ));

    let (local_addr, _) = timeout(Duration::from_secs(5), started_rx.recv())
        .await
        .unwrap()
        .unwrap();

    // Three connections against a capacity-1 queue with nobody draining.
    let mut clients = Vec::new();
    for marker in 0u8..3 {
        let mut client = TcpStream::connect(local_addr).await.unwrap();
        client.write_all(&[marker]).await.unwrap();
        clients.push(client);
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Drain: every accepted connection arrives exactly once, in order.
    for marker in 0u8..3 {
        let mut pending = timeout(Duration::from_secs(5), intake_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let mut buf = [0u8; 1];
        pending.upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0], marker);
    }

    shutdown.trigger();
    timeout(Duration::from_secs(5), listener_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_interrupts_a_blocked_accept() {
    init_tracing();
    let (intake_tx, _intake_rx) = intake_queue(1);
    let shutdown = ShutdownSignal::new();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let observer = Arc::new(StartedObserver {
        started: started_tx,
    });

    let spec: TunnelSpec = "127.0.0.1:0>127.0.0.1:1".parse().unwrap();
    let listener_task = tokio::spawn(listener::run(
        spec,
        intake_tx,
        shutdown.subscribe(),
        observer,
    ));
    timeout(Duration::from_secs(5), started_rx.recv())
        .await
        .unwrap()
        .unwrap();

    shutdown.trigger();
    let result = timeout(Duration::from_secs(5), listener_task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok(), "shutdown must be a clean stop: {result:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatcher_runs_one_worker_per_pending_tunnel_and_drains() {
    init_tracing();
    let (echo_addr, _closed) = spawn_echo_server().await;
    let (intake_tx, intake_rx) = intake_queue(5);
    let shutdown = ShutdownSignal::new();
    let dispatcher_task = tokio::spawn(dispatcher::run(
        intake_rx,
        shutdown.subscribe(),
        Arc::new(NullObserver),
    ));

    let mut clients = Vec::new();
    for _ in 0..3 {
        let (client, pending) = accepted_pair(echo_addr).await;
        intake_tx.send(pending).await.unwrap();
        clients.push(client);
    }

    // Every session relays independently.
    for (i, client) in clients.iter_mut().enumerate() {
        let message = format!("message-{i}");
        client.write_all(message.as_bytes()).await.unwrap();
        let mut buf = vec![0u8; message.len()];
        timeout(Duration::from_secs(5), client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf, message.as_bytes());
    }

    // Closing the queue stops admission; open sessions drain first.
    drop(intake_tx);
    drop(clients);
    timeout(Duration::from_secs(5), dispatcher_task)
        .await
        .unwrap()
        .unwrap();
}
