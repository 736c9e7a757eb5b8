//! # TCP Listener
//!
//! Accepts game clients and runs one [`SessionHandler`] task per connection.
//! Accept errors are logged and the loop keeps going; a failing session
//! never affects the acceptor.
//!
//! On shutdown the acceptor stops, aborts every session task (each one
//! unregisters itself as it is dropped) and waits up to the configured
//! shutdown timeout for them to finish.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RelayConfig;
use crate::core::codec::PacketCodec;
use crate::error::Result;
use crate::service::registry::Registry;
use crate::service::session::SessionHandler;
use crate::transport::discovery::DiscoveryAnnouncer;
use crate::utils::metrics::Metrics;

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the acceptor.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

pub struct RelayServer {
    listener: TcpListener,
    handler: SessionHandler,
    shutdown_timeout: Duration,
}

impl RelayServer {
    /// Bind the listener described by `config` with fresh shared state
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let handler = SessionHandler::new(
            Arc::new(Registry::new()),
            Arc::new(Metrics::new()),
            config.server.outbound_queue_capacity,
        );
        Self::bind_with(&config.server.address, handler, config.server.shutdown_timeout).await
    }

    /// Bind `addr` and serve sessions with an existing handler
    pub async fn bind_with(
        addr: &str,
        handler: SessionHandler,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            handler,
            shutdown_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handler(&self) -> &SessionHandler {
        &self.handler
    }

    /// Accept connections until `shutdown` is cancelled
    #[instrument(name = "relay", skip_all)]
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let address = self.local_addr()?;
        info!(%address, "Relay listening");
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "Session task panicked");
                        }
                    }
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(%peer, error = %e, "Failed to disable Nagle");
                        }
                        let handler = self.handler.clone();
                        sessions.spawn(async move {
                            if let Err(e) = handler.run(stream, Some(peer)).await {
                                debug!(%peer, error = %e, "Session ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        info!(sessions = sessions.len(), "Shutting down relay");
        sessions.abort_all();
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Shutdown timeout reached, forcing exit");
        }

        self.handler.metrics().log_metrics();
        Ok(())
    }
}

/// Run the relay and, if enabled, the discovery announcer until Ctrl+C
pub async fn start_server(config: RelayConfig) -> Result<()> {
    let shutdown = CancellationToken::new();

    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            on_signal.cancel();
        }
    });

    start_server_with_shutdown(config, shutdown).await
}

/// Run the relay and, if enabled, the discovery announcer until `shutdown`
/// is cancelled
pub async fn start_server_with_shutdown(
    config: RelayConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let server = RelayServer::bind(&config).await?;
    let game_port = server.local_addr()?.port();

    let announcer = if config.discovery.enabled {
        let announcer =
            DiscoveryAnnouncer::bind(&config.discovery, game_port, server.handler().metrics().clone())
                .await?;
        Some(tokio::spawn(announcer.run(shutdown.child_token())))
    } else {
        None
    };

    let served = server.serve(shutdown.clone()).await;

    shutdown.cancel();
    if let Some(task) = announcer {
        if let Err(e) = task.await {
            warn!(error = %e, "Discovery task ended abnormally");
        }
    }
    served
}

/// Connect to a relay as a client
pub async fn connect(addr: SocketAddr) -> Result<Framed<TcpStream, PacketCodec>> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(Framed::new(stream, PacketCodec))
}
