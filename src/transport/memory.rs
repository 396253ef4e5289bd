//! In-process loopback transport.
//!
//! [`MemoryTransport::pair`] returns the transport handed to a session and a
//! [`MemoryPeer`] that plays the remote device: it sees every datagram the
//! session sends, injects status datagrams, and can make sends fail.

use bytes::Bytes;
use futures::stream;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{trace, warn};

use crate::error::{ProtocolError, Result};
use crate::transport::{Datagram, DatagramStream, Transport};

struct PeerInner {
    addr: SocketAddr,
    inbound: mpsc::UnboundedSender<Datagram>,
    outbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    send_calls: AtomicUsize,
    fail_sends: AtomicBool,
}

pub struct MemoryTransport {
    outbound: mpsc::UnboundedSender<Datagram>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Datagram>>>,
    peer: Arc<PeerInner>,
}

/// The remote end of a [`MemoryTransport`]
#[derive(Clone)]
pub struct MemoryPeer {
    inner: Arc<PeerInner>,
}

impl MemoryTransport {
    /// Create a transport and the peer at `peer_addr`
    pub fn pair(peer_addr: SocketAddr) -> (Self, MemoryPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(PeerInner {
            addr: peer_addr,
            inbound: inbound_tx,
            outbound: tokio::sync::Mutex::new(outbound_rx),
            send_calls: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
        });

        let transport = Self {
            outbound: outbound_tx,
            inbound: Mutex::new(Some(inbound_rx)),
            peer: inner.clone(),
        };

        (transport, MemoryPeer { inner })
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, datagram: Datagram) -> Result<()> {
        self.peer.send_calls.fetch_add(1, Ordering::SeqCst);

        if self.peer.fail_sends.load(Ordering::SeqCst) {
            return Err(ProtocolError::TransportError(
                "send rejected by loopback peer".to_string(),
            ));
        }

        trace!(peer = %datagram.addr, bytes = datagram.payload.len(), "Loopback send");
        self.outbound
            .send(datagram)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// The first call takes the inbound queue; later calls get an empty stream.
    fn receive(&self) -> DatagramStream {
        let receiver = self
            .inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match receiver {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            None => {
                warn!("Loopback receive stream already taken");
                Box::pin(stream::empty())
            }
        }
    }
}

impl MemoryPeer {
    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// Deliver `payload` to the session as if sent from this peer
    pub fn inject(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.inject_from(self.inner.addr, payload)
    }

    /// Deliver `payload` from an arbitrary address
    pub fn inject_from(&self, addr: SocketAddr, payload: impl Into<Bytes>) -> Result<()> {
        self.inner
            .inbound
            .send(Datagram::new(addr, payload))
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Wait for the next datagram the session sent
    pub async fn next_sent(&self) -> Option<Datagram> {
        self.inner.outbound.lock().await.recv().await
    }

    /// Next sent datagram if one is already queued
    pub fn try_next_sent(&self) -> Option<Datagram> {
        self.inner.outbound.try_lock().ok()?.try_recv().ok()
    }

    /// Number of `send` calls made on the transport, failed ones included
    pub fn send_calls(&self) -> usize {
        self.inner.send_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent sends fail with a transport error
    pub fn fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::SeqCst);
    }
}
