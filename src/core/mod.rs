//! # Core Protocol Components
//!
//! Wire messages and the infrared signal codec.
//!
//! Neither component holds shared state or performs I/O.
//!
//! ## Components
//! - **Message**: `Command` and `Status` envelopes exchanged with the remote device
//! - **NEC**: raw pulse timings to and from validated three byte commands
//!
//! ## NEC Frame
//! ```text
//! [Leader] [A] [!A] [B] [!B] [C] [!C] [Stop]   (repeated once)
//! ```

pub mod message;
pub mod nec;
