//! # Relay Service
//!
//! Wires a [`RelayConfig`](crate::config::RelayConfig) into a running
//! session: binds the UDP socket, builds the configured encoder and drives
//! the ingestion loop on a background task until shutdown.

pub mod remote;

pub use remote::{RelaySession, RemoteService};
