//! # Remote Device Session
//!
//! Tracks whether the remote device is reachable and delivers commands to it
//! with at-least-once semantics.
//!
//! ## Liveness
//! The device sends a status datagram at least every heartbeat interval. The
//! session is online while an address is known and the last successfully
//! decoded datagram is younger than `heartbeat_interval * heartbeat_tolerance`.
//!
//! ## Delivery
//! Every command gets a fresh sequence number. It is retransmitted once per
//! `ack_timeout` until a status arrives whose watermark covers it, the
//! attempt cap is reached, or the caller cancels:
//!
//! ```text
//! Pending -> Retrying(1) -> ... -> Retrying(n) -> { Acked | Exhausted | Cancelled }
//! ```
//!
//! ## Notifications
//! Each in-flight command registers a bounded queue. Ingestion pushes every
//! decoded status to all registered queues without blocking; a full queue
//! drops the status. That loss is safe: the waiter times out and retransmits,
//! and the device tolerates duplicates.

use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn, Span};

use crate::config::SessionConfig;
use crate::core::message::{Command, Status};
use crate::error::constants::{ERR_NO_RESPONSE, ERR_SESSION_OFFLINE};
use crate::error::{ProtocolError, Result};
use crate::protocol::encoder::Encoder;
use crate::transport::{Datagram, Transport};
use crate::utils::metrics::{Metrics, Timer};

/// Lifecycle of one in-flight command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// First transmission awaiting acknowledgment
    Pending,
    /// The n-th retransmission awaiting acknowledgment
    Retrying(u32),
    Acked,
    Exhausted,
    Cancelled,
}

/// Outcome of one acknowledgment window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    Acked,
    TimedOut,
    Cancelled,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryState::Acked | DeliveryState::Exhausted | DeliveryState::Cancelled
        )
    }

    /// Transmissions made so far in this state
    pub fn transmissions(self) -> u32 {
        match self {
            DeliveryState::Pending => 1,
            DeliveryState::Retrying(n) => n + 1,
            _ => 0,
        }
    }

    /// Apply an event. Terminal states absorb every event.
    pub fn on(self, event: DeliveryEvent, max_attempts: u32) -> DeliveryState {
        if self.is_terminal() {
            return self;
        }

        match event {
            DeliveryEvent::Acked => DeliveryState::Acked,
            DeliveryEvent::Cancelled => DeliveryState::Cancelled,
            DeliveryEvent::TimedOut if self.transmissions() >= max_attempts => {
                DeliveryState::Exhausted
            }
            DeliveryEvent::TimedOut => DeliveryState::Retrying(self.transmissions()),
        }
    }
}

/// Point-in-time view of the session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub online: bool,
    pub remote_addr: Option<SocketAddr>,
    pub last_seen_ago: Option<Duration>,
    pub last_command_number: u64,
    pub pending: usize,
}

struct SessionState {
    remote_addr: Option<SocketAddr>,
    last_seen: Option<Instant>,
    /// Max of locally assigned and remotely reported sequence numbers
    last_command_number: u64,
    pending_acks: HashMap<u64, mpsc::Sender<Status>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            remote_addr: None,
            last_seen: None,
            last_command_number: 0,
            pending_acks: HashMap::new(),
        }
    }

    fn is_online(&self, window: Duration) -> bool {
        self.remote_addr.is_some() && self.last_seen.is_some_and(|seen| seen.elapsed() < window)
    }
}

/// Removes a pending-ack registration when the owning call ends, however it ends
struct PendingAck<'a> {
    state: &'a Mutex<SessionState>,
    sequence: u64,
}

impl Drop for PendingAck<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending_acks
            .remove(&self.sequence);
    }
}

pub struct Session<T: Transport, E: Encoder> {
    transport: Arc<T>,
    encoder: E,
    config: SessionConfig,
    state: Mutex<SessionState>,
    metrics: Metrics,
}

impl<T: Transport, E: Encoder> Session<T, E> {
    pub fn new(transport: Arc<T>, encoder: E, config: SessionConfig) -> Self {
        Self {
            transport,
            encoder,
            config,
            state: Mutex::new(SessionState::new()),
            metrics: Metrics::new(),
        }
    }

    pub fn with_defaults(transport: Arc<T>, encoder: E) -> Self {
        Self::new(transport, encoder, SessionConfig::default())
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Whether a valid datagram arrived within the heartbeat window
    pub fn is_online(&self) -> bool {
        self.lock_state().is_online(self.config.online_window())
    }

    /// Highest sequence number assigned locally or reported by the device
    pub fn last_command_number(&self) -> u64 {
        self.lock_state().last_command_number
    }

    /// Address of the last valid datagram
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.lock_state().remote_addr
    }

    /// Commands currently awaiting acknowledgment
    pub fn pending_count(&self) -> usize {
        self.lock_state().pending_acks.len()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            online: state.is_online(self.config.online_window()),
            remote_addr: state.remote_addr,
            last_seen_ago: state.last_seen.map(|seen| seen.elapsed()),
            last_command_number: state.last_command_number,
            pending: state.pending_acks.len(),
        }
    }

    /// Deliver `data` to the remote device.
    ///
    /// Returns once the device's watermark covers the command. Fails with
    /// `Offline` without any I/O when the device is not reachable,
    /// `SequenceExhausted` without any I/O once the counter is at `u64::MAX`,
    /// `NoResponse` after `max_attempts` unacknowledged transmissions, and
    /// `Cancelled` as soon as `cancel` fires. Transport errors abort
    /// immediately.
    #[instrument(skip_all, fields(pulses = data.len(), sequence = tracing::field::Empty))]
    pub async fn send_command(&self, cancel: &CancellationToken, data: Vec<u32>) -> Result<()> {
        let _timer = Timer::start("send_command");
        let (tx, mut rx) = mpsc::channel(self.config.notify_capacity.max(1));

        let (command, addr) = {
            let mut state = self.lock_state();
            let online = state.is_online(self.config.online_window());
            let addr = match (online, state.remote_addr) {
                (true, Some(addr)) => addr,
                _ => {
                    drop(state);
                    self.metrics.command_rejected();
                    warn!("{ERR_SESSION_OFFLINE}, rejecting command");
                    return Err(ProtocolError::Offline);
                }
            };

            let Some(sequence) = state.last_command_number.checked_add(1) else {
                let watermark = state.last_command_number;
                drop(state);
                self.metrics.command_rejected();
                warn!(watermark, "Sequence space exhausted, rejecting command");
                return Err(ProtocolError::SequenceExhausted { watermark });
            };
            state.last_command_number = sequence;
            state.pending_acks.insert(sequence, tx);
            (Command { data, sequence }, addr)
        };

        let sequence = command.sequence;
        let _registration = PendingAck {
            state: &self.state,
            sequence,
        };
        Span::current().record("sequence", sequence);
        self.metrics.command_issued();

        // Command always serializes; see `Encoder::encrypt`
        let payload = Bytes::from(self.encoder.encrypt(&command)?);
        let datagram = Datagram::new(addr, payload);
        let max_attempts = self.config.max_attempts;
        let mut delivery = DeliveryState::Pending;

        loop {
            if let DeliveryState::Retrying(retry) = delivery {
                self.metrics.retransmission();
                debug!(retry, "Retransmitting command");
            }

            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => DeliveryEvent::Cancelled,
                sent = self.transport.send(datagram.clone()) => {
                    if let Err(e) = sent {
                        warn!(error = %e, peer = %addr, "Transport failed, aborting delivery");
                        return Err(e);
                    }
                    self.metrics.datagram_sent(datagram.payload.len() as u64);
                    self.await_ack(cancel, &mut rx, sequence).await
                }
            };

            delivery = delivery.on(event, max_attempts);
            trace!(state = ?delivery, "Delivery state changed");

            match delivery {
                DeliveryState::Acked => {
                    self.metrics.command_acked();
                    info!(peer = %addr, "Command acknowledged");
                    return Ok(());
                }
                DeliveryState::Exhausted => {
                    self.metrics.command_exhausted();
                    warn!(attempts = max_attempts, "{ERR_NO_RESPONSE}");
                    return Err(ProtocolError::NoResponse {
                        attempts: max_attempts,
                    });
                }
                DeliveryState::Cancelled => {
                    self.metrics.command_cancelled();
                    info!("Command delivery cancelled");
                    return Err(ProtocolError::Cancelled);
                }
                DeliveryState::Pending | DeliveryState::Retrying(_) => {}
            }
        }
    }

    /// Wait one acknowledgment window for a status covering `sequence`
    async fn await_ack(
        &self,
        cancel: &CancellationToken,
        rx: &mut mpsc::Receiver<Status>,
        sequence: u64,
    ) -> DeliveryEvent {
        let deadline = sleep(self.config.ack_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return DeliveryEvent::Cancelled,
                status = rx.recv() => match status {
                    Some(status) if status.acknowledges(sequence) => return DeliveryEvent::Acked,
                    Some(status) => {
                        trace!(watermark = status.watermark, "Status does not cover command yet");
                    }
                    None => {
                        (&mut deadline).await;
                        return DeliveryEvent::TimedOut;
                    }
                },
                _ = &mut deadline => return DeliveryEvent::TimedOut,
            }
        }
    }

    /// Consume inbound datagrams until `shutdown` fires.
    ///
    /// Undecodable datagrams are logged and dropped. Returns
    /// `ConnectionClosed` if the transport stream ends first.
    #[instrument(name = "Session::run", skip_all)]
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!("Starting session ingestion loop");
        let mut inbound = self.transport.receive();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Session ingestion loop stopped");
                    return Ok(());
                }
                next = inbound.next() => match next {
                    Some(datagram) => {
                        let peer = datagram.addr;
                        if let Err(e) = self.handle_datagram(datagram) {
                            warn!(%peer, error = %e, "Dropping undecodable datagram");
                        }
                    }
                    None => {
                        warn!("Transport receive stream ended");
                        return Err(ProtocolError::ConnectionClosed);
                    }
                },
            }
        }
    }

    /// Ingest one datagram.
    ///
    /// On success the remote address, liveness and watermark are updated and
    /// every pending command is notified. On failure nothing changes.
    pub fn handle_datagram(&self, datagram: Datagram) -> Result<Status> {
        self.metrics
            .datagram_received(datagram.payload.len() as u64);

        let status: Status = match self.encoder.decrypt(&datagram.payload) {
            Ok(status) => status,
            Err(e) => {
                self.metrics.decode_failure();
                return Err(e);
            }
        };

        let waiters: Vec<mpsc::Sender<Status>> = {
            let mut state = self.lock_state();

            if state.remote_addr != Some(datagram.addr) {
                info!(peer = %datagram.addr, "Remote device address updated");
            }
            state.remote_addr = Some(datagram.addr);
            state.last_seen = Some(Instant::now());
            if status.watermark > state.last_command_number {
                state.last_command_number = status.watermark;
            }

            state.pending_acks.values().cloned().collect()
        };

        debug!(
            peer = %datagram.addr,
            watermark = status.watermark,
            waiters = waiters.len(),
            "Status received"
        );

        for waiter in waiters {
            match waiter.try_send(status) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.metrics.notification_dropped();
                    debug!("Waiter queue full, dropping status notification");
                }
                // the waiter has already returned
                Err(TrySendError::Closed(_)) => {}
            }
        }

        Ok(status)
    }
}
