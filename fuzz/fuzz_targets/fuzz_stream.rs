#![no_main]

use bytes::BytesMut;
use game_relay::core::codec::PacketCodec;
use game_relay::protocol::sanitize::sanitize;
use game_relay::SessionId;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Decode a client stream and push every packet through sanitization
    let mut buf = BytesMut::from(data);
    let mut codec = PacketCodec;
    loop {
        match codec.decode(&mut buf) {
            Ok(Some(packet)) => {
                if let Ok(out) = sanitize(packet, SessionId(1)) {
                    assert!(out.packet.total_size() <= 1024);
                }
            }
            Ok(None) => {
                let _ = codec.decode_eof(&mut buf);
                break;
            }
            Err(_) => break,
        }
    }
});
