//! Observability and Metrics
//!
//! Counters for session delivery and transport activity.
//!
//! Uses atomic counters for thread-safe metrics collection; every
//! [`Session`](crate::protocol::session::Session) owns one instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for one session
#[derive(Debug)]
pub struct Metrics {
    /// Datagrams handed to the transport
    pub datagrams_sent: AtomicU64,
    /// Datagrams taken from the receive stream
    pub datagrams_received: AtomicU64,
    /// Payload bytes sent
    pub bytes_sent: AtomicU64,
    /// Payload bytes received
    pub bytes_received: AtomicU64,
    /// Inbound datagrams dropped because they failed to decode
    pub decode_failures: AtomicU64,
    /// Commands assigned a sequence number
    pub commands_issued: AtomicU64,
    /// Commands confirmed by the remote watermark
    pub commands_acked: AtomicU64,
    /// Commands that ran out of attempts
    pub commands_exhausted: AtomicU64,
    /// Commands abandoned through cancellation
    pub commands_cancelled: AtomicU64,
    /// Commands rejected because the session was offline
    pub commands_rejected: AtomicU64,
    /// Transmissions beyond the first for a command
    pub retransmissions: AtomicU64,
    /// Status notifications dropped because a waiter's queue was full
    pub notifications_dropped: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            datagrams_sent: AtomicU64::new(0),
            datagrams_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            commands_issued: AtomicU64::new(0),
            commands_acked: AtomicU64::new(0),
            commands_exhausted: AtomicU64::new(0),
            commands_cancelled: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            retransmissions: AtomicU64::new(0),
            notifications_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a datagram sent
    pub fn datagram_sent(&self, byte_count: u64) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram received
    pub fn datagram_received(&self, byte_count: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_issued(&self) {
        self.commands_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_acked(&self) {
        self.commands_acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_exhausted(&self) {
        self.commands_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_cancelled(&self) {
        self.commands_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retransmission(&self) {
        self.retransmissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notification_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            commands_issued: self.commands_issued.load(Ordering::Relaxed),
            commands_acked: self.commands_acked.load(Ordering::Relaxed),
            commands_exhausted: self.commands_exhausted.load(Ordering::Relaxed),
            commands_cancelled: self.commands_cancelled.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            retransmissions: self.retransmissions.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            datagrams_sent = snapshot.datagrams_sent,
            datagrams_received = snapshot.datagrams_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            decode_failures = snapshot.decode_failures,
            commands_issued = snapshot.commands_issued,
            commands_acked = snapshot.commands_acked,
            commands_exhausted = snapshot.commands_exhausted,
            commands_cancelled = snapshot.commands_cancelled,
            commands_rejected = snapshot.commands_rejected,
            retransmissions = snapshot.retransmissions,
            notifications_dropped = snapshot.notifications_dropped,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub decode_failures: u64,
    pub commands_issued: u64,
    pub commands_acked: u64,
    pub commands_exhausted: u64,
    pub commands_cancelled: u64,
    pub commands_rejected: u64,
    pub retransmissions: u64,
    pub notifications_dropped: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
