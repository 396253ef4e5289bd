//! Messages exchanged with the remote device.
//!
//! Both travel as JSON inside an encoder payload:
//!
//! ```text
//! Command: {"data": [562, 1687, ...], "sequence": 7}
//! Status:  {"last_command_sequence_number": 7}
//! ```

use serde::{Deserialize, Serialize};

/// A command envelope sent to the remote device.
///
/// `data` is the raw pulse sequence to transmit; `sequence` is assigned by
/// the session when the command is issued and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub data: Vec<u32>,
    pub sequence: u64,
}

/// Status reported by the remote device.
///
/// The watermark is cumulative: every command up to and including it has
/// been executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "last_command_sequence_number")]
    pub watermark: u64,
}

impl Status {
    pub fn new(watermark: u64) -> Self {
        Self { watermark }
    }

    /// Whether this status confirms execution of `sequence`
    #[inline]
    pub fn acknowledges(&self, sequence: u64) -> bool {
        self.watermark >= sequence
    }
}
