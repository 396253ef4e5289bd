use futures::stream;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, instrument};

use crate::error::constants::ERR_SHORT_WRITE;
use crate::error::{ProtocolError, Result};
use crate::transport::{Datagram, DatagramStream, Transport};

/// UDP transport backed by a tokio socket
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    max_datagram_size: usize,
}

impl UdpTransport {
    /// Bind a socket on `addr`
    #[instrument]
    pub async fn bind(addr: SocketAddr, max_datagram_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(local = %socket.local_addr()?, "Listening for remote device");

        Ok(Self {
            socket: Arc::new(socket),
            max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl Transport for UdpTransport {
    async fn send(&self, datagram: Datagram) -> Result<()> {
        debug!(peer = %datagram.addr, bytes = datagram.payload.len(), "Sending datagram");

        let written = self
            .socket
            .send_to(&datagram.payload, datagram.addr)
            .await?;
        if written != datagram.payload.len() {
            return Err(ProtocolError::TransportError(format!(
                "{ERR_SHORT_WRITE}: wrote {written} of {} bytes",
                datagram.payload.len()
            )));
        }

        Ok(())
    }

    fn receive(&self) -> DatagramStream {
        let socket = self.socket.clone();
        let size = self.max_datagram_size;

        Box::pin(stream::unfold(socket, move |socket| async move {
            let mut buf = vec![0u8; size];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((n, addr)) => {
                        debug!(peer = %addr, bytes = n, "Received datagram");
                        buf.truncate(n);
                        return Some((Datagram::new(addr, buf), socket));
                    }
                    // ICMP unreachable from an earlier send, reported on some platforms
                    Err(e) if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                    ) =>
                    {
                        debug!(error = %e, "Ignoring unreachable report");
                    }
                    Err(e) => {
                        error!(error = %e, "Error reading from UDP socket");
                        return None;
                    }
                }
            }
        }))
    }
}
