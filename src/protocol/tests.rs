// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::core::codec::PacketCodec;
use crate::core::packet::{Packet, PacketType};
use crate::core::types::SessionId;
use crate::protocol::handshake::{login_packet, parse_login};
use crate::protocol::sanitize::{sanitize, Route};

fn wire(packet_type: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&packet_type.to_le_bytes());
    out.extend_from_slice(&((8 + body.len()) as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

#[test]
fn test_spoofed_move_leaves_the_server_with_sender_id() {
    let mut codec = PacketCodec;

    // Session 2 claims to be player 9 and sends x/y floats after the id.
    let mut body = 9u32.to_le_bytes().to_vec();
    body.extend_from_slice(&1.5f32.to_le_bytes());
    body.extend_from_slice(&(-3.0f32).to_le_bytes());
    let mut inbound = BytesMut::from(&wire(2, &body)[..]);

    let decoded = codec.decode(&mut inbound).unwrap().expect("complete packet");
    let out = sanitize(decoded, SessionId(2)).unwrap();
    assert_eq!(out.route, Route::Others);

    let mut outbound = BytesMut::new();
    codec.encode(out.packet, &mut outbound).unwrap();

    let mut expected = 2u32.to_le_bytes().to_vec();
    expected.extend_from_slice(&body[4..]);
    assert_eq!(&outbound[..8], &wire(2, &body)[..8]);
    assert_eq!(&outbound[8..], &expected[..]);
}

#[test]
fn test_damage_round_trips_byte_for_byte() {
    let mut codec = PacketCodec;
    let mut body = 3u32.to_le_bytes().to_vec();
    body.extend_from_slice(&25.0f32.to_le_bytes());
    let bytes = wire(PacketType::PlayerDamage.as_u32(), &body);

    let mut inbound = BytesMut::from(&bytes[..]);
    let decoded = codec.decode(&mut inbound).unwrap().unwrap();
    let out = sanitize(decoded, SessionId(1)).unwrap();
    assert_eq!(out.route, Route::All);

    let mut outbound = BytesMut::new();
    codec.encode(out.packet, &mut outbound).unwrap();
    assert_eq!(&outbound[..], &bytes[..]);
}

#[test]
fn test_client_learns_its_id_from_the_first_packet() {
    let mut codec = PacketCodec;
    let mut stream = BytesMut::new();
    codec.encode(login_packet(SessionId(5)), &mut stream).unwrap();
    codec
        .encode(Packet::new(PacketType::Move, vec![1, 0, 0, 0]), &mut stream)
        .unwrap();

    let first = codec.decode(&mut stream).unwrap().unwrap();
    assert_eq!(parse_login(&first).unwrap(), SessionId(5));

    let second = codec.decode(&mut stream).unwrap().unwrap();
    assert!(parse_login(&second).is_err());
}

#[test]
fn test_byte_at_a_time_delivery() {
    let mut codec = PacketCodec;
    let bytes = wire(PacketType::EnemySpawn.as_u32(), &[1, 2, 3, 4, 5, 6]);
    let mut buf = BytesMut::new();

    let mut decoded = None;
    for (i, b) in bytes.iter().enumerate() {
        buf.extend_from_slice(&[*b]);
        let result = codec.decode(&mut buf).unwrap();
        if i + 1 < bytes.len() {
            assert!(result.is_none(), "decoded early at byte {i}");
        } else {
            decoded = result;
        }
    }

    let packet = decoded.expect("packet after last byte");
    assert_eq!(packet.kind(), Some(PacketType::EnemySpawn));
    assert_eq!(&packet.body[..], &[1, 2, 3, 4, 5, 6]);
}
