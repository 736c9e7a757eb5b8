//! Identity handshake.
//!
//! There is no negotiation: right after accepting a connection the server
//! sends one LOGIN packet whose body is the session id it assigned, and the
//! client adopts that id as its own. Clients never send LOGIN to the server;
//! if one does, it is relayed like any other unsanitized packet.

use crate::config::HEADER_SIZE;
use crate::core::packet::{Packet, PacketType};
use crate::core::types::SessionId;
use crate::error::{RelayError, Result};

/// Size of the welcome packet on the wire: header + 4-byte id
pub const LOGIN_PACKET_SIZE: usize = HEADER_SIZE + 4;

/// Build the welcome packet telling a client which id it was given
pub fn login_packet(id: SessionId) -> Packet {
    Packet::new(PacketType::Login, id.get().to_le_bytes().to_vec())
}

/// Client side: extract the assigned id from the first packet received
pub fn parse_login(packet: &Packet) -> Result<SessionId> {
    if packet.kind() != Some(PacketType::Login) {
        return Err(RelayError::UnexpectedPacket(packet.packet_type));
    }
    packet
        .identity()
        .map(SessionId)
        .ok_or(RelayError::MissingIdentity {
            packet_type: packet.packet_type,
            body_len: packet.body.len(),
        })
}
