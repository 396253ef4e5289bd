//! # Transport Layer
//!
//! Datagram transports the session sends commands over and receives
//! status packets from.
//!
//! The session never owns a socket; it holds a handle implementing
//! [`Transport`]. `send` must be safe to call while a receive stream is
//! being consumed.
//!
//! ## Implementations
//! - [`udp::UdpTransport`]: tokio UDP socket
//! - [`memory::MemoryTransport`]: in-process loopback with a scriptable peer

use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use crate::error::Result;

pub mod memory;
pub mod udp;

/// A single packet together with the remote address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub addr: SocketAddr,
    pub payload: Bytes,
}

impl Datagram {
    pub fn new(addr: SocketAddr, payload: impl Into<Bytes>) -> Self {
        Self {
            addr,
            payload: payload.into(),
        }
    }
}

/// Inbound datagrams; ends only when the transport shuts down
pub type DatagramStream = Pin<Box<dyn Stream<Item = Datagram> + Send>>;

pub trait Transport: Send + Sync + 'static {
    /// Send one datagram. An error is a local or link fault.
    fn send(&self, datagram: Datagram) -> impl Future<Output = Result<()>> + Send;

    /// Stream of inbound datagrams
    fn receive(&self) -> DatagramStream;
}
