//! # Connection Registry
//!
//! The authoritative set of live sessions, addressable by [`SessionId`].
//!
//! Id assignment, insertion, removal and enumeration all happen under one
//! mutex, so a broadcast either sees a session completely or not at all, and
//! never sees one that has already been unregistered. Enumeration only ever
//! performs non-blocking enqueues, so the lock is never held across an await.
//!
//! The registry is an explicit component: build one at startup and hand an
//! `Arc<Registry>` to the acceptor, the relay and every session.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::core::packet::Packet;
use crate::core::types::SessionId;
use crate::error::{RelayError, Result};

/// Why a packet could not be handed to a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The peer's outbound queue is full; it is not keeping up and has been
    /// told to shut down
    Backlogged,
    /// The peer's writer has stopped; its session is on the way out
    Closed,
}

/// Registry entry: the write side of one session's connection
#[derive(Debug, Clone)]
pub struct Peer {
    addr: Option<SocketAddr>,
    outbound: mpsc::Sender<Packet>,
    cancel: CancellationToken,
}

impl Peer {
    /// `cancel` is the owning session's token; cancelling it ends that
    /// session through its normal teardown.
    pub fn new(
        addr: Option<SocketAddr>,
        outbound: mpsc::Sender<Packet>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            addr,
            outbound,
            cancel,
        }
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Queue a packet for this peer without waiting.
    ///
    /// A full queue is a failed write: the packet is not retried and the
    /// peer's session is cancelled, so its client sees the connection close
    /// instead of a stream with packets missing from the middle.
    pub fn deliver(&self, packet: Packet) -> std::result::Result<(), DeliveryError> {
        self.outbound.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => {
                self.cancel.cancel();
                DeliveryError::Backlogged
            }
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

struct Inner {
    next_id: u32,
    peers: HashMap<SessionId, Peer>,
}

pub struct Registry {
    inner: Mutex<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: SessionId::FIRST.get(),
                peers: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| RelayError::LockPoisoned)
    }

    /// Assign the next id and insert the peer, atomically.
    pub fn register(&self, peer: Peer) -> Result<SessionId> {
        let mut inner = self.lock()?;
        let id = SessionId(inner.next_id);
        inner.next_id = inner
            .next_id
            .checked_add(1)
            .ok_or(RelayError::IdentifiersExhausted)?;
        inner.peers.insert(id, peer);
        Ok(id)
    }

    /// Remove a session. Returns false if it was not registered, which is
    /// expected when two teardown paths race.
    pub fn unregister(&self, id: SessionId) -> Result<bool> {
        let mut inner = self.lock()?;
        Ok(inner.peers.remove(&id).is_some())
    }

    /// Call `f` once per registered session while holding the registry lock.
    /// `f` must not call back into the registry.
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(SessionId, &Peer),
    {
        let inner = self.lock()?;
        for (id, peer) in inner.peers.iter() {
            f(*id, peer);
        }
        Ok(())
    }

    pub fn contains(&self, id: SessionId) -> Result<bool> {
        Ok(self.lock()?.peers.contains_key(&id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.peers.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Sorted ids of every registered session
    pub fn ids(&self) -> Result<Vec<SessionId>> {
        let mut ids: Vec<SessionId> = self.lock()?.peers.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
