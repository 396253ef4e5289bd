use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::RelayConfig;
use crate::core::nec::{NecTiming, SignalCommand};
use crate::error::{ProtocolError, Result};
use crate::protocol::encoder::ConfiguredEncoder;
use crate::protocol::session::Session;
use crate::transport::udp::UdpTransport;

/// Session type driven by [`RemoteService`]
pub type RelaySession = Session<UdpTransport, ConfiguredEncoder>;

/// A relay bound to a UDP socket with its ingestion loop running.
///
/// Dropping the service stops the ingestion loop; [`RemoteService::shutdown`]
/// additionally waits for it and reports how it ended.
pub struct RemoteService {
    session: Arc<RelaySession>,
    timing: NecTiming,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    ingest: Option<JoinHandle<Result<()>>>,
}

impl RemoteService {
    /// Validate `config`, bind the socket and start ingesting status datagrams
    #[instrument(skip_all, fields(bind = %config.transport.bind_address))]
    pub async fn start(config: &RelayConfig) -> Result<Self> {
        let (warnings, errors): (Vec<String>, Vec<String>) = config
            .validate()
            .into_iter()
            .partition(|issue| issue.starts_with("WARNING"));

        for warning in &warnings {
            warn!("{warning}");
        }
        if !errors.is_empty() {
            return Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )));
        }

        let transport = UdpTransport::bind(
            config.transport.socket_addr()?,
            config.transport.max_datagram_size,
        )
        .await?;
        let local_addr = transport.local_addr()?;

        let encoder = ConfiguredEncoder::from_config(&config.encoder);
        let session = Arc::new(Session::new(
            Arc::new(transport),
            encoder,
            config.session.clone(),
        ));

        let shutdown = CancellationToken::new();
        let ingest = tokio::spawn({
            let session = session.clone();
            let shutdown = shutdown.clone();
            async move { session.run(shutdown).await }
        });

        info!(%local_addr, encoder = ?config.encoder.kind, "Relay service started");

        Ok(Self {
            session,
            timing: config.signal,
            local_addr,
            shutdown,
            ingest: Some(ingest),
        })
    }

    pub fn session(&self) -> &Arc<RelaySession> {
        &self.session
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token cancelled when the service shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Deliver raw pulse durations; aborted if the service shuts down first
    pub async fn send_command(&self, data: Vec<u32>) -> Result<()> {
        let cancel = self.shutdown.child_token();
        self.session.send_command(&cancel, data).await
    }

    /// Render `command` with the configured timings and deliver it
    pub async fn send_signal<C: SignalCommand>(&self, command: &C) -> Result<()> {
        self.send_command(command.to_signal(&self.timing)).await
    }

    /// Stop the ingestion loop and wait for it to finish
    #[instrument(skip_all, fields(local_addr = %self.local_addr))]
    pub async fn shutdown(mut self) -> Result<()> {
        self.shutdown.cancel();

        let outcome = match self.ingest.take() {
            Some(handle) => handle
                .await
                .map_err(|e| ProtocolError::TransportError(format!("Ingestion task failed: {e}")))?,
            None => Ok(()),
        };

        self.session.metrics().log_metrics();
        info!("Relay service stopped");
        outcome
    }
}

impl Drop for RemoteService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
