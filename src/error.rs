//! # Error Types
//!
//! Error handling for the relay server.
//!
//! Every error raised inside a session's read loop is fatal to that session
//! only. The acceptor, the registry and every other session keep running; the
//! client simply observes its connection closing.
//!
//! ## Error Categories
//! - **Protocol violations**: declared packet size out of bounds, a packet too
//!   short to carry the identity field the sanitization rule needs
//! - **Transport errors**: I/O failures and streams that end mid-packet
//! - **Registry errors**: poisoned lock, identifier space exhausted
//! - **Configuration errors**: unreadable or invalid configuration
//!
//! ## Example Usage
//! ```rust
//! use game_relay::core::packet::Packet;
//! use game_relay::error::RelayError;
//!
//! // A header declaring 7 bytes cannot even hold itself.
//! let bytes = [2, 0, 0, 0, 7, 0, 0, 0];
//! match Packet::from_bytes(&bytes) {
//!     Err(e) if e.is_protocol_violation() => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! # let _ = RelayError::LockPoisoned;
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    pub const ERR_BAD_MAGIC: &str = "Announcement magic mismatch";
    pub const ERR_BAD_LENGTH: &str = "Announcement has the wrong length";
}

/// RelayError is the error type for every relay operation
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Declared packet size {0} is smaller than the header")]
    UndersizedPacket(u32),

    #[error("Declared packet size {0} exceeds the maximum packet size")]
    OversizedPacket(u32),

    #[error("Packet type {packet_type} needs a 4-byte identity field, body has {body_len} bytes")]
    MissingIdentity { packet_type: u32, body_len: usize },

    #[error("Transport closed with {buffered} bytes of an incomplete packet buffered")]
    TransportClosed { buffered: usize },

    #[error("Unexpected packet type {0}")]
    UnexpectedPacket(u32),

    #[error("Invalid discovery announcement: {0}")]
    InvalidAnnouncement(&'static str),

    #[error("Session identifier space exhausted")]
    IdentifiersExhausted,

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RelayError {
    /// True for malformed or malicious input from a peer, as opposed to
    /// transport or local failures.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            RelayError::UndersizedPacket(_)
                | RelayError::OversizedPacket(_)
                | RelayError::MissingIdentity { .. }
        )
    }

    /// True when the peer went away, cleanly or not.
    pub fn is_transport(&self) -> bool {
        matches!(self, RelayError::Io(_) | RelayError::TransportClosed { .. })
    }
}

/// Type alias for Results using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
