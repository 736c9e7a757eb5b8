//! # Transport Layer
//!
//! Sockets the relay listens and broadcasts on.
//!
//! ## Components
//! - **TCP**: game client acceptor, server lifecycle and a client connector
//! - **Discovery**: periodic UDP broadcast of the server's announcement

pub mod discovery;
pub mod tcp;

pub use discovery::DiscoveryAnnouncer;
pub use tcp::{connect, start_server, start_server_with_shutdown, RelayServer};
