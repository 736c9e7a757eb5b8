//! # Session Handler
//!
//! Drives one client connection from accept to teardown:
//!
//! 1. register the connection and obtain its [`SessionId`]
//! 2. write the LOGIN welcome packet carrying that id
//! 3. decode packets, sanitize them, and hand them to the [`Relay`]
//!
//! ```text
//! Connected ──LOGIN sent──▶ Identified ──▶ Relaying
//!     │                         │              │
//!     └─────────── any error / close ──────────┴──▶ Closed
//! ```
//!
//! The connection is split in two. This task owns the read half. A writer
//! task owns the write half and drains the session's outbound queue, which
//! is what other sessions' broadcasts feed. The welcome packet is written
//! before the writer task starts, so it is always the first thing a client
//! receives even if relay traffic was queued for it in the meantime.
//!
//! Teardown runs exactly once on every exit path, including task abort: the
//! session is unregistered, the writer is stopped and both halves of the
//! connection are dropped. Errors end this session only.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::core::types::SessionId;
use crate::error::Result;
use crate::protocol::handshake::login_packet;
use crate::protocol::sanitize::sanitize;
use crate::service::registry::{Peer, Registry};
use crate::service::relay::Relay;
use crate::utils::metrics::Metrics;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, welcome packet not yet written
    Connected,
    /// Client has been told its id
    Identified,
    /// Read loop is relaying packets
    Relaying,
    /// Unregistered and disconnected
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connected, Identified) | (Identified, Relaying) | (Connected, Closed)
                | (Identified, Closed)
                | (Relaying, Closed)
        )
    }
}

/// Why a session ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the stream between packets
    ClientClosed,
    /// Writing to the client failed or its outbound queue overflowed, so the
    /// session shut itself down
    WriterStopped,
}

/// Everything a session needs, cloned once per accepted connection
#[derive(Clone)]
pub struct SessionHandler {
    registry: Arc<Registry>,
    relay: Relay,
    metrics: Arc<Metrics>,
    outbound_capacity: usize,
}

impl SessionHandler {
    pub fn new(registry: Arc<Registry>, metrics: Arc<Metrics>, outbound_capacity: usize) -> Self {
        Self {
            relay: Relay::new(registry.clone(), metrics.clone()),
            registry,
            metrics,
            outbound_capacity: outbound_capacity.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run a session over `stream` until it closes or fails.
    #[instrument(name = "session", skip(self, stream, addr), fields(peer = ?addr, session_id = tracing::field::Empty))]
    pub async fn run<S>(&self, stream: S, addr: Option<SocketAddr>) -> Result<SessionEnd>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = FramedRead::new(read_half, PacketCodec);
        let writer = FramedWrite::new(write_half, PacketCodec);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_capacity);

        let mut session = Session::open(
            self.registry.clone(),
            self.metrics.clone(),
            addr,
            outbound_tx,
        )?;
        tracing::Span::current().record("session_id", session.id.get());
        info!("Player connected");

        let outcome = self.drive(&mut session, reader, writer, outbound_rx).await;
        session.close();

        match &outcome {
            Ok(end) => info!(?end, "Player disconnected"),
            Err(e) if e.is_protocol_violation() => {
                self.metrics.protocol_error();
                warn!(error = %e, "Player dropped for protocol violation");
            }
            Err(e) => {
                self.metrics.transport_error();
                info!(error = %e, "Player connection failed");
            }
        }
        outcome
    }

    async fn drive<S>(
        &self,
        session: &mut Session,
        mut reader: FramedRead<ReadHalf<S>, PacketCodec>,
        mut writer: FramedWrite<WriteHalf<S>, PacketCodec>,
        outbound: mpsc::Receiver<Packet>,
    ) -> Result<SessionEnd>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        writer.send(login_packet(session.id)).await?;
        session.advance(SessionState::Identified);
        debug!("Assigned id sent to client");

        let writer_task = tokio::spawn(write_loop(writer, outbound, session.cancel.clone()));

        session.advance(SessionState::Relaying);
        let result = self.relay_loop(session, &mut reader).await;

        session.cancel.cancel();
        if let Err(e) = writer_task.await {
            warn!(error = %e, "Writer task ended abnormally");
        }
        result
    }

    async fn relay_loop<R>(
        &self,
        session: &Session,
        reader: &mut FramedRead<R, PacketCodec>,
    ) -> Result<SessionEnd>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let next = tokio::select! {
                _ = session.cancel.cancelled() => return Ok(SessionEnd::WriterStopped),
                next = reader.next() => next,
            };

            let packet = match next {
                None => return Ok(SessionEnd::ClientClosed),
                Some(decoded) => decoded?,
            };
            self.metrics.packet_received(packet.total_size() as u64);

            let sanitized = sanitize(packet, session.id)?;
            if sanitized.rewritten {
                self.metrics.identity_rewritten();
            }

            self.relay
                .dispatch(&sanitized.packet, session.id, sanitized.route)?;
        }
    }
}

/// Drain the outbound queue onto the wire. Batches whatever is already
/// queued into one flush. Stops on cancellation, when the queue closes, or
/// on the first write error, which it reports by cancelling the session.
async fn write_loop<W>(
    mut writer: FramedWrite<W, PacketCodec>,
    mut outbound: mpsc::Receiver<Packet>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => break,
            next = outbound.recv() => match next {
                Some(packet) => packet,
                None => break,
            },
        };

        let written = tokio::select! {
            _ = cancel.cancelled() => break,
            written = write_batch(&mut writer, first, &mut outbound) => written,
        };

        if let Err(e) = written {
            debug!(error = %e, "Write to client failed");
            cancel.cancel();
            break;
        }
    }
}

async fn write_batch<W>(
    writer: &mut FramedWrite<W, PacketCodec>,
    first: Packet,
    outbound: &mut mpsc::Receiver<Packet>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.feed(first).await?;
    while let Ok(packet) = outbound.try_recv() {
        writer.feed(packet).await?;
    }
    writer.flush().await
}

/// Registry membership of one connection. Closing (explicitly or on drop)
/// unregisters it and stops its writer, once.
struct Session {
    id: SessionId,
    state: SessionState,
    cancel: CancellationToken,
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Session {
    fn open(
        registry: Arc<Registry>,
        metrics: Arc<Metrics>,
        addr: Option<SocketAddr>,
        outbound: mpsc::Sender<Packet>,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let id = registry.register(Peer::new(addr, outbound, cancel.clone()))?;
        metrics.session_opened();
        Ok(Self {
            id,
            state: SessionState::Connected,
            cancel,
            registry,
            metrics,
        })
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(session_id = %self.id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.advance(SessionState::Closed);
        self.cancel.cancel();
        match self.registry.unregister(self.id) {
            Ok(_) => self.metrics.session_closed(),
            Err(e) => warn!(session_id = %self.id, error = %e, "Failed to unregister session"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
