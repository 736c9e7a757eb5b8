//! # Protocol Layer
//!
//! Rules the relay applies on top of raw packets.
//!
//! ## Components
//! - **Handshake**: the LOGIN welcome packet carrying the assigned session id
//! - **Sanitize**: per-type identity rewriting and recipient routing
//! - **Discovery**: the LAN announcement datagram
//!
//! Nothing here does I/O; the service layer drives these functions.

pub mod discovery;
pub mod handshake;
pub mod sanitize;

#[cfg(test)]
mod tests;
