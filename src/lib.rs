//! # ir-relay
//!
//! Relays infrared remote-control commands to a networked IR transmitter.
//!
//! A [`Session`](protocol::session::Session) tracks whether the remote
//! device is reachable from its periodic status datagrams, and delivers
//! commands with at-least-once semantics: each command carries a sequence
//! number and is retransmitted until the device's reported watermark covers
//! it. Payloads are encrypted block by block with AES-256 under a shared secret. The
//! [`NecCommand`](core::nec::NecCommand) codec turns captured pulse timings
//! into validated three byte commands and back.
//!
//! ## Quick Start
//! ```no_run
//! use ir_relay::config::RelayConfig;
//! use ir_relay::core::nec::NecCommand;
//! use ir_relay::service::RemoteService;
//!
//! # async fn relay() -> ir_relay::Result<()> {
//! let config = RelayConfig::default_with_overrides(|config| {
//!     config.encoder.shared_secret = "living-room".to_string();
//! });
//! let service = RemoteService::start(&config).await?;
//! service.send_signal(&NecCommand::new([0x04, 0x08, 0x01])).await?;
//! service.shutdown().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::RelayConfig;
pub use crate::core::message::{Command, Status};
pub use crate::core::nec::{NecCommand, NecTiming, SignalCommand};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::encoder::{AesEncoder, ConfiguredEncoder, Encoder, PlainEncoder};
pub use crate::protocol::session::Session;
pub use crate::service::RemoteService;
pub use crate::transport::{Datagram, Transport};
