//! # Packet
//!
//! One unit of the game's wire protocol: an 8-byte header followed by a
//! type-specific body.
//!
//! ```text
//! [type: u32 LE] [totalSize: u32 LE] [body: totalSize - 8 bytes]
//! ```
//!
//! `totalSize` counts the header itself and must lie in
//! `[HEADER_SIZE, MAX_PACKET_SIZE]`. It is checked before any body buffer is
//! allocated, so a peer cannot make the server reserve memory by lying about
//! the size.
//!
//! The body is opaque apart from the identity field: for move, attack and
//! damage packets the first four bytes are a little-endian player id.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::{HEADER_SIZE, IDENTITY_SIZE, MAX_PACKET_SIZE};
use crate::error::{RelayError, Result};

/// Packet kinds understood by the game clients. Values are fixed by the
/// protocol and must never be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PacketType {
    Login = 1,
    Move = 2,
    PlayerDisconnected = 3,
    EnemySpawn = 4,
    EnemyUpdate = 5,
    EnemyDamage = 6,
    EnemyDeath = 7,
    PlayerAttack = 8,
    HostAnnounce = 9,
    PlayerDamage = 10,
}

impl PacketType {
    /// Map a raw header value to a known kind. Unknown values are still
    /// relayed, they just have no name.
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => PacketType::Login,
            2 => PacketType::Move,
            3 => PacketType::PlayerDisconnected,
            4 => PacketType::EnemySpawn,
            5 => PacketType::EnemyUpdate,
            6 => PacketType::EnemyDamage,
            7 => PacketType::EnemyDeath,
            8 => PacketType::PlayerAttack,
            9 => PacketType::HostAnnounce,
            10 => PacketType::PlayerDamage,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Whether the body starts with a player id the relay inspects
    pub fn carries_identity(self) -> bool {
        matches!(
            self,
            PacketType::Move | PacketType::PlayerAttack | PacketType::PlayerDamage
        )
    }
}

impl From<PacketType> for u32 {
    fn from(kind: PacketType) -> u32 {
        kind.as_u32()
    }
}

/// Decoded packet. The body is reference counted, so cloning a packet for
/// each broadcast recipient does not copy the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: u32,
    pub body: Bytes,
}

impl Packet {
    pub fn new(packet_type: impl Into<u32>, body: impl Into<Bytes>) -> Self {
        Self {
            packet_type: packet_type.into(),
            body: body.into(),
        }
    }

    /// Named kind of this packet, if the type is one the protocol defines
    pub fn kind(&self) -> Option<PacketType> {
        PacketType::from_u32(self.packet_type)
    }

    /// `totalSize` as it appears on the wire
    #[inline]
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    /// The little-endian id at body offset 0, if the body is long enough
    pub fn identity(&self) -> Option<u32> {
        let field = self.body.get(..IDENTITY_SIZE)?;
        let mut raw = [0u8; IDENTITY_SIZE];
        raw.copy_from_slice(field);
        Some(u32::from_le_bytes(raw))
    }

    /// Copy of this packet with the identity field replaced by `id`.
    /// The original packet and its buffer are left untouched.
    pub fn with_identity(&self, id: u32) -> Result<Packet> {
        if self.body.len() < IDENTITY_SIZE {
            return Err(RelayError::MissingIdentity {
                packet_type: self.packet_type,
                body_len: self.body.len(),
            });
        }

        let mut body = BytesMut::with_capacity(self.body.len());
        body.put_u32_le(id);
        body.extend_from_slice(&self.body[IDENTITY_SIZE..]);
        Ok(Packet {
            packet_type: self.packet_type,
            body: body.freeze(),
        })
    }

    /// Serialize header and body. Sizes are not re-validated here: a packet
    /// either came out of the decoder or was built by the server itself.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size());
        self.write_into(&mut out);
        out
    }

    pub(crate) fn write_into<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.packet_type);
        dst.put_u32_le(self.total_size() as u32);
        dst.put_slice(&self.body);
    }

    /// Parse one complete packet from the start of `bytes`.
    ///
    /// Fails with a size violation before looking at the body, and with
    /// `TransportClosed` when `bytes` holds less than the declared packet.
    /// Trailing bytes after the packet are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Packet> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(RelayError::TransportClosed {
                buffered: bytes.len(),
            });
        };
        let (packet_type, total_size) = parse_header(header)?;

        let Some(body) = bytes.get(HEADER_SIZE..total_size) else {
            return Err(RelayError::TransportClosed {
                buffered: bytes.len(),
            });
        };

        Ok(Packet {
            packet_type,
            body: Bytes::copy_from_slice(body),
        })
    }
}

/// Read the header fields and check the declared size.
/// Returns the raw type and the total size as a `usize`.
pub(crate) fn parse_header(header: &[u8]) -> Result<(u32, usize)> {
    let mut type_raw = [0u8; 4];
    let mut size_raw = [0u8; 4];
    type_raw.copy_from_slice(&header[0..4]);
    size_raw.copy_from_slice(&header[4..8]);

    let packet_type = u32::from_le_bytes(type_raw);
    let total_size = u32::from_le_bytes(size_raw);

    if (total_size as usize) < HEADER_SIZE {
        return Err(RelayError::UndersizedPacket(total_size));
    }
    if total_size as usize > MAX_PACKET_SIZE {
        return Err(RelayError::OversizedPacket(total_size));
    }

    Ok((packet_type, total_size as usize))
}
