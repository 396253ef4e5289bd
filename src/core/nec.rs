//! # NEC Signal Codec
//!
//! Converts raw infrared pulse timings into a validated three byte command
//! and back.
//!
//! A capture is an alternating mark/space sequence of durations in
//! microseconds. Every duration is snapped to the nearest [`Pulse`]; leader
//! pulses ([`Pulse::Initiator`], [`Pulse::Filler`]) delimit frames and every
//! other pair encodes one bit:
//!
//! ```text
//! Short Short  -> 0
//! Short Long   -> 1
//! ```
//!
//! A frame carries six bytes, each payload byte followed by its bitwise
//! complement, packed least-significant bit first. The whole frame is sent
//! [`NecTiming::frame_count`] times and all copies must agree.
//!
//! ## Wire Layout (per frame, as produced by [`NecCommand::encode`])
//! ```text
//! [Filler] [Initiator] [Short, Short|Long] x 48 [Short]
//! ```
//! The trailing short mark is the NEC stop bit; a dangling mark without its
//! space is discarded when the next leader arrives or the capture ends.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of payload bytes in a command
pub const PAYLOAD_BYTES: usize = 3;

/// Bytes per frame: every payload byte is followed by its complement
pub const FRAME_BYTES: usize = PAYLOAD_BYTES * 2;

const FRAME_BITS: usize = FRAME_BYTES * 8;

/// Reference durations (microseconds) and frame repeat count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NecTiming {
    /// Mark of every bit, and the space of a zero bit
    pub short: u32,
    /// Space of a one bit
    pub long: u32,
    /// Leader space
    pub initiator: u32,
    /// Leader mark, the remainder of the 9000us leader after the initiator
    pub filler: u32,
    /// Number of identical frames in one transmission
    pub frame_count: usize,
}

impl Default for NecTiming {
    fn default() -> Self {
        Self {
            short: 562,
            long: 1687,
            initiator: 4300,
            filler: 9000 - 4300,
            frame_count: 2,
        }
    }
}

impl NecTiming {
    /// Validate signal timing configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.short == 0 {
            errors.push("Short pulse duration must be greater than 0".to_string());
        }

        if self.long <= self.short {
            errors.push(format!(
                "Long pulse ({}us) must be longer than short pulse ({}us)",
                self.long, self.short
            ));
        }

        if self.initiator <= self.long || self.filler <= self.long {
            errors.push("Leader pulses must be longer than the long pulse".to_string());
        }

        if self.initiator == self.filler {
            errors.push("Initiator and filler durations must differ".to_string());
        }

        if self.frame_count == 0 {
            errors.push("Frame count must be at least 1".to_string());
        }

        errors
    }
}

/// Canonical pulse a raw duration snaps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
    Short,
    Long,
    Initiator,
    Filler,
}

impl Pulse {
    /// Declaration order; also the tie-break order of [`Pulse::classify`]
    pub const ALL: [Pulse; 4] = [Pulse::Short, Pulse::Long, Pulse::Initiator, Pulse::Filler];

    /// Nearest canonical pulse by absolute difference.
    ///
    /// On a tie the pulse declared first wins.
    pub fn classify(duration: u32, timing: &NecTiming) -> Pulse {
        let mut closest = Pulse::Short;
        for pulse in Self::ALL {
            if pulse.duration(timing).abs_diff(duration) < closest.duration(timing).abs_diff(duration)
            {
                closest = pulse;
            }
        }
        closest
    }

    /// Reference duration of this pulse
    pub fn duration(self, timing: &NecTiming) -> u32 {
        match self {
            Pulse::Short => timing.short,
            Pulse::Long => timing.long,
            Pulse::Initiator => timing.initiator,
            Pulse::Filler => timing.filler,
        }
    }

    /// Leader pulses delimit frames
    pub fn is_leader(self) -> bool {
        matches!(self, Pulse::Initiator | Pulse::Filler)
    }
}

/// Anything that can be parsed from, and rendered to, a raw signal sequence
pub trait SignalCommand: Sized {
    /// Parse a captured timing sequence
    fn from_signal(signal: &[u32], timing: &NecTiming) -> Result<Self>;

    /// Render the timing sequence a transmitter should emit
    fn to_signal(&self, timing: &NecTiming) -> Vec<u32>;
}

/// A validated NEC command: three payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NecCommand {
    bytes: [u8; PAYLOAD_BYTES],
}

impl NecCommand {
    pub fn new(bytes: [u8; PAYLOAD_BYTES]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> [u8; PAYLOAD_BYTES] {
        self.bytes
    }

    /// Decode a raw capture.
    ///
    /// Fails without producing a partial command if any framing, length,
    /// repeat or checksum rule is violated.
    pub fn decode(signal: &[u32], timing: &NecTiming) -> Result<Self> {
        let frames = split_frames(signal, timing)?;

        for (frame, bits) in frames.iter().enumerate() {
            if bits.len() % 8 != 0 {
                return Err(ProtocolError::BadLength {
                    frame,
                    bits: bits.len(),
                });
            }
        }

        if frames.len() != timing.frame_count {
            return Err(ProtocolError::WrongFrameCount {
                expected: timing.frame_count,
                actual: frames.len(),
            });
        }

        let Some((first, repeats)) = frames.split_first() else {
            return Err(ProtocolError::WrongFrameCount {
                expected: timing.frame_count,
                actual: 0,
            });
        };
        if repeats.iter().any(|frame| frame != first) {
            return Err(ProtocolError::FrameMismatch);
        }

        if first.len() != FRAME_BITS {
            return Err(ProtocolError::BadLength {
                frame: 0,
                bits: first.len(),
            });
        }

        let packed = pack_lsb_first(first);
        let mut bytes = [0u8; PAYLOAD_BYTES];
        for (pair, chunk) in packed.chunks_exact(2).enumerate() {
            let (value, complement) = (chunk[0], chunk[1]);
            if value ^ complement != 0xFF {
                return Err(ProtocolError::ChecksumFailed {
                    pair,
                    value,
                    complement,
                });
            }
            bytes[pair] = value;
        }

        Ok(Self { bytes })
    }

    /// Render the canonical timing sequence for this command
    pub fn encode(&self, timing: &NecTiming) -> Vec<u32> {
        let frame_len = 2 + FRAME_BITS * 2 + 1;
        let mut signal = Vec::with_capacity(frame_len * timing.frame_count);

        for _ in 0..timing.frame_count {
            signal.push(timing.filler);
            signal.push(timing.initiator);

            for byte in self.bytes.iter().flat_map(|&b| [b, !b]) {
                for bit in 0..8 {
                    signal.push(timing.short);
                    signal.push(if (byte >> bit) & 1 == 1 {
                        timing.long
                    } else {
                        timing.short
                    });
                }
            }

            // stop bit
            signal.push(timing.short);
        }

        signal
    }
}

impl SignalCommand for NecCommand {
    fn from_signal(signal: &[u32], timing: &NecTiming) -> Result<Self> {
        Self::decode(signal, timing)
    }

    fn to_signal(&self, timing: &NecTiming) -> Vec<u32> {
        self.encode(timing)
    }
}

impl fmt::Display for NecCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NEC {:08b} {:08b} {:08b}",
            self.bytes[0], self.bytes[1], self.bytes[2]
        )
    }
}

/// Split a capture into bit frames at every leader pulse
fn split_frames(signal: &[u32], timing: &NecTiming) -> Result<Vec<Vec<bool>>> {
    let mut frames = Vec::new();
    let mut current = Vec::new();
    let mut prelude = false;

    for (position, &value) in signal.iter().enumerate() {
        let pulse = Pulse::classify(value, timing);

        if pulse.is_leader() {
            if !current.is_empty() {
                frames.push(std::mem::take(&mut current));
            }
            prelude = false;
            continue;
        }

        match (prelude, pulse) {
            (false, Pulse::Short) => prelude = true,
            (false, _) => {
                return Err(ProtocolError::MalformedSignal {
                    position,
                    value,
                    expected: "short mark",
                })
            }
            (true, Pulse::Short) => {
                current.push(false);
                prelude = false;
            }
            (true, Pulse::Long) => {
                current.push(true);
                prelude = false;
            }
            (true, _) => {
                return Err(ProtocolError::MalformedSignal {
                    position,
                    value,
                    expected: "short or long space",
                })
            }
        }
    }

    if !current.is_empty() {
        frames.push(current);
    }

    Ok(frames)
}

/// Pack bits into bytes, least significant bit first. `bits.len()` must be
/// a multiple of 8.
fn pack_lsb_first(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|byte| {
            byte.iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | (u8::from(bit) << i))
        })
        .collect()
}
