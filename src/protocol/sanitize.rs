//! Identity sanitization and routing.
//!
//! Clients are trusted with game state but not with who they are. For move
//! and attack packets the first body field names the acting player, so the
//! relay overwrites it with the sender's real session id. For damage packets
//! the same field names the player being hit and is left alone; those
//! packets also go back to the sender so its copy of the target stays in
//! sync. Everything else passes through untouched.
//!
//! [`sanitize`] never mutates its input. It returns the packet to relay,
//! which shares the original body when nothing had to change.

use tracing::debug;

use crate::core::packet::{Packet, PacketType};
use crate::core::types::SessionId;
use crate::error::{RelayError, Result};

/// Which sessions a relayed packet goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Every registered session except the one it came from
    Others,
    /// Every registered session, sender included
    All,
}

/// What the relay does with a packet's identity field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Overwrite with the sender's id
    Rewrite,
    /// Must be present, kept as sent (it names someone else)
    Preserve,
    /// Body is opaque
    Ignore,
}

impl IdentityPolicy {
    pub fn for_type(packet_type: u32) -> Self {
        match PacketType::from_u32(packet_type) {
            Some(PacketType::Move) | Some(PacketType::PlayerAttack) => IdentityPolicy::Rewrite,
            Some(PacketType::PlayerDamage) => IdentityPolicy::Preserve,
            _ => IdentityPolicy::Ignore,
        }
    }
}

/// Route for a packet type
pub fn route_for(packet_type: u32) -> Route {
    match PacketType::from_u32(packet_type) {
        Some(PacketType::PlayerDamage) => Route::All,
        _ => Route::Others,
    }
}

/// A packet ready for the relay engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub packet: Packet,
    pub route: Route,
    /// True when the identity field was overwritten with a different value
    pub rewritten: bool,
}

/// Apply the identity rule for `origin` and pick the route.
///
/// Move, attack and damage packets shorter than the identity field are
/// protocol violations.
pub fn sanitize(packet: Packet, origin: SessionId) -> Result<Sanitized> {
    let route = route_for(packet.packet_type);

    match IdentityPolicy::for_type(packet.packet_type) {
        IdentityPolicy::Ignore => Ok(Sanitized {
            packet,
            route,
            rewritten: false,
        }),
        IdentityPolicy::Preserve => {
            let target = require_identity(&packet)?;
            debug!(
                session_id = %origin,
                target_id = target,
                "Player damage reported"
            );
            Ok(Sanitized {
                packet,
                route,
                rewritten: false,
            })
        }
        IdentityPolicy::Rewrite => {
            let claimed = require_identity(&packet)?;
            if packet.kind() == Some(PacketType::PlayerAttack) {
                debug!(session_id = %origin, claimed_id = claimed, "Player attack relayed");
            }
            if claimed == origin.get() {
                return Ok(Sanitized {
                    packet,
                    route,
                    rewritten: false,
                });
            }
            Ok(Sanitized {
                packet: packet.with_identity(origin.get())?,
                route,
                rewritten: true,
            })
        }
    }
}

fn require_identity(packet: &Packet) -> Result<u32> {
    packet.identity().ok_or(RelayError::MissingIdentity {
        packet_type: packet.packet_type,
        body_len: packet.body.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_with_id(id: u32, tail: &[u8]) -> Vec<u8> {
        let mut body = id.to_le_bytes().to_vec();
        body.extend_from_slice(tail);
        body
    }

    #[test]
    fn move_is_rewritten_to_sender() {
        let packet = Packet::new(PacketType::Move, body_with_id(99, &[1, 2, 3]));
        let out = sanitize(packet, SessionId(4)).unwrap();
        assert_eq!(out.packet.identity(), Some(4));
        assert_eq!(&out.packet.body[4..], &[1, 2, 3]);
        assert_eq!(out.route, Route::Others);
        assert!(out.rewritten);
    }

    #[test]
    fn attack_with_zero_id_is_rewritten() {
        let packet = Packet::new(PacketType::PlayerAttack, body_with_id(0, &[5]));
        let out = sanitize(packet, SessionId(12)).unwrap();
        assert_eq!(out.packet.identity(), Some(12));
        assert_eq!(out.route, Route::Others);
    }

    #[test]
    fn honest_move_is_not_copied() {
        let packet = Packet::new(PacketType::Move, body_with_id(6, &[0xAA]));
        let out = sanitize(packet.clone(), SessionId(6)).unwrap();
        assert!(!out.rewritten);
        assert_eq!(out.packet, packet);
    }

    #[test]
    fn damage_keeps_target_and_goes_to_everyone() {
        let packet = Packet::new(PacketType::PlayerDamage, body_with_id(2, &[10, 0, 0, 0]));
        let out = sanitize(packet.clone(), SessionId(5)).unwrap();
        assert_eq!(out.packet, packet);
        assert_eq!(out.route, Route::All);
        assert!(!out.rewritten);
    }

    #[test]
    fn other_types_pass_through() {
        for raw in [3u32, 4, 5, 6, 7, 9, 1, 42] {
            let packet = Packet::new(raw, vec![0xFF; 3]);
            let out = sanitize(packet.clone(), SessionId(1)).unwrap();
            assert_eq!(out.packet, packet);
            assert_eq!(out.route, Route::Others);
        }
    }

    #[test]
    fn short_identity_bodies_are_violations() {
        for kind in [PacketType::Move, PacketType::PlayerAttack, PacketType::PlayerDamage] {
            let err = sanitize(Packet::new(kind, vec![1, 2, 3]), SessionId(1)).unwrap_err();
            assert!(err.is_protocol_violation(), "{kind:?}");
        }
    }
}
