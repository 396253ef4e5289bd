//! Delivery and liveness behaviour of a session talking to a simulated device
//! over the in-process transport. Runs on tokio's paused clock.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ir_relay::config::SessionConfig;
use ir_relay::core::message::{Command, Status};
use ir_relay::protocol::encoder::{AesEncoder, Encoder};
use ir_relay::protocol::session::Session;
use ir_relay::transport::memory::{MemoryPeer, MemoryTransport};
use ir_relay::transport::Transport;
use ir_relay::ProtocolError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const SECRET: &str = "integration-secret";

type DeviceSession = Session<MemoryTransport, AesEncoder>;

/// Plays the IR transmitter on the far side of the loopback transport
struct Device {
    peer: MemoryPeer,
    encoder: AesEncoder,
}

impl Device {
    fn report(&self, watermark: u64) {
        let payload = self.encoder.encrypt(&Status::new(watermark)).unwrap();
        self.peer.inject(payload).unwrap();
    }

    async fn next_command(&self) -> Command {
        let datagram = self.peer.next_sent().await.unwrap();
        assert_eq!(datagram.addr, self.peer.addr());
        self.encoder.decrypt(&datagram.payload).unwrap()
    }
}

struct Harness {
    session: Arc<DeviceSession>,
    device: Device,
    shutdown: CancellationToken,
    ingest: JoinHandle<ir_relay::Result<()>>,
}

fn device_addr() -> SocketAddr {
    "192.168.4.20:1234".parse().unwrap()
}

fn harness() -> Harness {
    let (transport, peer) = MemoryTransport::pair(device_addr());
    let session = Arc::new(Session::new(
        Arc::new(transport),
        AesEncoder::new(SECRET),
        SessionConfig::default(),
    ));

    let shutdown = CancellationToken::new();
    let ingest = tokio::spawn({
        let session = session.clone();
        let shutdown = shutdown.clone();
        async move { session.run(shutdown).await }
    });

    Harness {
        session,
        device: Device {
            peer,
            encoder: AesEncoder::new(SECRET),
        },
        shutdown,
        ingest,
    }
}

async fn bring_online(h: &Harness, watermark: u64) {
    h.device.report(watermark);
    while !h.session.is_online() {
        tokio::task::yield_now().await;
    }
}

fn spawn_send(
    session: &Arc<DeviceSession>,
    cancel: &CancellationToken,
    data: Vec<u32>,
) -> JoinHandle<ir_relay::Result<()>> {
    let session = session.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move { session.send_command(&cancel, data).await })
}

#[tokio::test(start_paused = true)]
async fn offline_session_rejects_without_io() {
    let h = harness();
    assert!(!h.session.is_online());

    let result = h
        .session
        .send_command(&CancellationToken::new(), vec![1, 2, 3, 4, 5, 6, 7, 8])
        .await;

    assert!(matches!(result, Err(ProtocolError::Offline)));
    assert_eq!(h.device.peer.send_calls(), 0);
    assert_eq!(h.session.pending_count(), 0);
    assert_eq!(h.session.metrics().snapshot().commands_rejected, 1);
}

#[tokio::test(start_paused = true)]
async fn online_follows_heartbeat_window() {
    let h = harness();
    assert!(!h.session.is_online());

    bring_online(&h, 0).await;
    assert_eq!(h.session.remote_addr(), Some(device_addr()));

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(h.session.is_online());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(!h.session.is_online());

    // the next heartbeat restores it
    bring_online(&h, 0).await;
    assert!(h.session.is_online());
}

#[tokio::test(start_paused = true)]
async fn echoed_watermark_acknowledges_after_one_send() {
    let h = harness();
    bring_online(&h, 0).await;

    let task = spawn_send(&h.session, &CancellationToken::new(), vec![9000, 4500, 562]);
    let command = h.device.next_command().await;
    assert_eq!(command.sequence, 1);
    assert_eq!(command.data, vec![9000, 4500, 562]);

    h.device.report(command.sequence);
    task.await.unwrap().unwrap();

    assert_eq!(h.device.peer.send_calls(), 1);
    assert_eq!(h.session.pending_count(), 0);
    assert_eq!(h.session.last_command_number(), 1);
    assert_eq!(h.session.metrics().snapshot().commands_acked, 1);
}

#[tokio::test(start_paused = true)]
async fn silent_device_exhausts_ten_attempts() {
    let h = harness();
    bring_online(&h, 0).await;

    let started = Instant::now();
    let result = h
        .session
        .send_command(&CancellationToken::new(), vec![562, 1687])
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(
        result,
        Err(ProtocolError::NoResponse { attempts: 10 })
    ));
    assert_eq!(h.device.peer.send_calls(), 10);
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(11));

    // every retransmission carries the same sequence number
    for _ in 0..10 {
        assert_eq!(h.device.next_command().await.sequence, 1);
    }
    assert!(h.device.peer.try_next_sent().is_none());
    assert_eq!(h.session.pending_count(), 0);

    let metrics = h.session.metrics().snapshot();
    assert_eq!(metrics.retransmissions, 9);
    assert_eq!(metrics.commands_exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn late_acknowledgment_stops_retries() {
    let h = harness();
    bring_online(&h, 0).await;

    let task = spawn_send(&h.session, &CancellationToken::new(), vec![1]);
    let first = h.device.next_command().await;
    // device missed the first copy; answer the third
    h.device.next_command().await;
    h.device.next_command().await;
    h.device.report(first.sequence);

    task.await.unwrap().unwrap();
    assert_eq!(h.device.peer.send_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn stale_watermark_does_not_acknowledge() {
    let h = harness();
    bring_online(&h, 5).await;

    let task = spawn_send(&h.session, &CancellationToken::new(), vec![1]);
    let command = h.device.next_command().await;
    assert_eq!(command.sequence, 6);

    h.device.report(5);
    let retry = h.device.next_command().await;
    assert_eq!(retry.sequence, 6);
    assert!(!task.is_finished());

    h.device.report(6);
    task.await.unwrap().unwrap();
    assert_eq!(h.device.peer.send_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_ends_delivery_promptly() {
    let h = harness();
    bring_online(&h, 0).await;

    let cancel = CancellationToken::new();
    let task = spawn_send(&h.session, &cancel, vec![1, 2]);
    h.device.next_command().await;
    h.device.next_command().await;

    let started = Instant::now();
    cancel.cancel();
    let result = task.await.unwrap();

    assert!(matches!(result, Err(ProtocolError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(h.device.peer.send_calls(), 2);
    assert_eq!(h.session.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_fault_is_not_retried() {
    let h = harness();
    bring_online(&h, 0).await;
    h.device.peer.fail_sends(true);

    let result = h
        .session
        .send_command(&CancellationToken::new(), vec![1])
        .await;

    assert!(matches!(result, Err(ProtocolError::TransportError(_))));
    assert_eq!(h.device.peer.send_calls(), 1);
    assert_eq!(h.session.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_commands_are_acknowledged_independently() {
    let h = harness();
    bring_online(&h, 0).await;

    let cancel = CancellationToken::new();
    let volume = spawn_send(&h.session, &cancel, vec![111]);
    let power = spawn_send(&h.session, &cancel, vec![222]);

    let a = h.device.next_command().await;
    let b = h.device.next_command().await;
    assert_ne!(a.sequence, b.sequence);
    let (low, high) = if a.sequence < b.sequence { (a, b) } else { (b, a) };
    let (low_task, high_task) = if low.data == vec![111] {
        (volume, power)
    } else {
        (power, volume)
    };

    h.device.report(low.sequence);
    low_task.await.unwrap().unwrap();
    assert!(!high_task.is_finished());
    assert_eq!(h.session.pending_count(), 1);

    h.device.report(high.sequence);
    high_task.await.unwrap().unwrap();
    assert_eq!(h.session.pending_count(), 0);
    assert_eq!(h.session.last_command_number(), high.sequence);
}

#[tokio::test(start_paused = true)]
async fn wrong_secret_traffic_is_dropped() {
    let h = harness();
    let intruder = AesEncoder::new("not-the-secret");
    let payload = intruder.encrypt(&Status::new(99)).unwrap();
    h.device.peer.inject(payload).unwrap();
    h.device.peer.inject(&b"noise"[..]).unwrap();

    while h.session.metrics().snapshot().decode_failures < 2 {
        tokio::task::yield_now().await;
    }

    assert!(!h.session.is_online());
    assert_eq!(h.session.remote_addr(), None);
    assert_eq!(h.session.last_command_number(), 0);
}

#[tokio::test(start_paused = true)]
async fn ingestion_stops_on_shutdown() {
    let h = harness();
    bring_online(&h, 3).await;

    h.shutdown.cancel();
    h.ingest.await.unwrap().unwrap();
    assert_eq!(h.session.last_command_number(), 3);
}

#[tokio::test(start_paused = true)]
async fn ended_stream_reports_closed_connection() {
    let (transport, _peer) = MemoryTransport::pair(device_addr());
    let transport = Arc::new(transport);
    // someone else already owns the inbound queue
    let _taken = transport.receive();

    let session = Session::new(transport, AesEncoder::new(SECRET), SessionConfig::default());
    let result = session.run(CancellationToken::new()).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}
