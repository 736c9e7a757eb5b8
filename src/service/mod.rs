//! # Relay Services
//!
//! The stateful part of the server.
//!
//! ## Components
//! - **Registry**: concurrency-safe map of live sessions and id assignment
//! - **Relay**: fan-out of a packet to all sessions or all but its sender
//! - **Session**: per-connection handshake, read loop and teardown

pub mod registry;
pub mod relay;
pub mod session;

pub use registry::{DeliveryError, Peer, Registry};
pub use relay::{DeliveryReport, Relay};
pub use session::{SessionEnd, SessionHandler, SessionState};
