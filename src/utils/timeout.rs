//! Protocol timing constants.
//!
//! The remote device sends a status heartbeat every [`HEARTBEAT_INTERVAL`]; it
//! is considered reachable while the last valid packet is younger than
//! `HEARTBEAT_INTERVAL * HEARTBEAT_TOLERANCE`.

use std::time::Duration;

/// Expected interval between heartbeats from the remote device
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Number of missed heartbeats before the remote is considered offline
pub const HEARTBEAT_TOLERANCE: u32 = 3;

/// How long a single delivery attempt waits for an acknowledgment
pub const ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Hard cap on transmissions of one command
pub const MAX_SEND_ATTEMPTS: u32 = 10;

/// Queue depth of each waiter's acknowledgment channel
pub const NOTIFY_CAPACITY: usize = 10;

/// Window after which a silent remote is reported offline
pub fn online_window(interval: Duration, tolerance: u32) -> Duration {
    interval.saturating_mul(tolerance)
}
