//! # Game Relay
//!
//! A low-latency packet relay for LAN multiplayer games. Clients connect
//! over TCP, are handed a numeric player id, and every packet they send is
//! forwarded to the other players. The relay does not interpret game state;
//! it only enforces identity on the packets that name a player, so one
//! client cannot move or attack as another.
//!
//! ## Wire Format
//! ```text
//! [Type(4, LE)] [TotalSize(4, LE)] [Body(TotalSize - 8)]
//! ```
//! `TotalSize` includes the header and is between 8 and 1024.
//!
//! ## Example
//! ```no_run
//! use game_relay::{start_server, RelayConfig};
//!
//! # async fn run() -> game_relay::Result<()> {
//! let config = RelayConfig::default();
//! start_server(config).await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::RelayConfig;
pub use crate::core::codec::PacketCodec;
pub use crate::core::packet::{Packet, PacketType};
pub use crate::core::types::SessionId;
pub use crate::error::{RelayError, Result};
pub use crate::protocol::discovery::Announcement;
pub use crate::service::{Registry, Relay, SessionHandler};
pub use crate::transport::{start_server, DiscoveryAnnouncer, RelayServer};
pub use crate::utils::metrics::Metrics;
