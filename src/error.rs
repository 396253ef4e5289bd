//! # Error Types
//!
//! Error handling for the relay protocol.
//!
//! This module defines all error variants that can occur while relaying
//! commands, from transport faults to malformed inbound payloads.
//!
//! ## Error Categories
//! - **Delivery**: the remote device is offline, never acknowledged, or the
//!   caller cancelled the wait
//! - **Framing**: encrypted payloads with a bad length, padding or magic marker
//! - **Signal**: raw infrared timings that do not form a valid NEC command
//! - **Transport**: socket failures and closed receive streams
//! - **Configuration**: unreadable or invalid settings
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use ir_relay::error::{ProtocolError, Result};
//! use tracing::{error, info};
//!
//! fn check(online: bool) -> Result<()> {
//!     if !online {
//!         return Err(ProtocolError::Offline);
//!     }
//!     Ok(())
//! }
//!
//! match check(false) {
//!     Ok(()) => info!("Remote is reachable"),
//!     Err(e) => error!(error = %e, "Cannot relay command"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants shared by log lines and error payloads.
pub mod constants {
    pub const ERR_SESSION_OFFLINE: &str = "Session is offline";
    pub const ERR_NO_RESPONSE: &str = "No response from remote device";
    pub const ERR_SHORT_WRITE: &str = "Datagram was only partially written";
}

/// ProtocolError is the primary error type for all relay operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Session is offline")]
    Offline,

    #[error("No response from remote device after {attempts} attempts")]
    NoResponse { attempts: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Sequence numbers exhausted: remote reported watermark {watermark}")]
    SequenceExhausted { watermark: u64 },

    #[error("Invalid payload length: {0} bytes")]
    InvalidLength(usize),

    #[error("Invalid padding byte: {0}")]
    InvalidPadding(u8),

    #[error("Invalid magic marker")]
    InvalidMagic,

    #[error("Malformed signal at position {position}: expected {expected}, got {value}")]
    MalformedSignal {
        position: usize,
        value: u32,
        expected: &'static str,
    },

    #[error("Frame {frame} has {bits} bits, expected whole bytes forming a complete frame")]
    BadLength { frame: usize, bits: usize },

    #[error("Expected {expected} frames, got {actual}")]
    WrongFrameCount { expected: usize, actual: usize },

    #[error("Repeated frames differ")]
    FrameMismatch,

    #[error("Checksum failed for pair {pair}: {value:#04x} ^ {complement:#04x} != 0xff")]
    ChecksumFailed { pair: usize, value: u8, complement: u8 },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether this error came from malformed input rather than a local fault.
    ///
    /// Malformed inbound packets are always dropped by the ingestion loop;
    /// explicit decode calls surface them to the caller.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ProtocolError::Json(_)
                | ProtocolError::InvalidLength(_)
                | ProtocolError::InvalidPadding(_)
                | ProtocolError::InvalidMagic
                | ProtocolError::MalformedSignal { .. }
                | ProtocolError::BadLength { .. }
                | ProtocolError::WrongFrameCount { .. }
                | ProtocolError::FrameMismatch
                | ProtocolError::ChecksumFailed { .. }
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
