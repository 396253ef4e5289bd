//! # Utility Modules
//!
//! Supporting utilities for cryptography, logging, metrics, and timing.
//!
//! ## Components
//! - **Crypto**: Block-wise AES-256 framing with a passphrase-derived key
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe session counters
//! - **Timeout**: Heartbeat and retry timing constants
//!
//! ## Security
//! - Fresh random IV per payload (rand)
//! - Derived key material is zeroed on drop (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
