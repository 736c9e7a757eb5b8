//! Tokio codec framing [`Packet`]s over a byte stream.
//!
//! The decoder waits for a full header, validates the declared size, reserves
//! exactly the missing bytes, and only then splits the frame off the read
//! buffer. A stream that ends on a packet boundary is a clean close; one that
//! ends with a partial header or body left in the buffer is an error.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::HEADER_SIZE;
use crate::core::packet::{parse_header, Packet};
use crate::error::RelayError;

#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let (packet_type, total_size) = parse_header(&src[..HEADER_SIZE])?;

        if src.len() < total_size {
            // total_size is bounded by MAX_PACKET_SIZE at this point
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total_size);
        frame.advance(HEADER_SIZE);

        Ok(Some(Packet {
            packet_type,
            body: frame.freeze(),
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => Err(RelayError::TransportClosed {
                buffered: src.len(),
            }),
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = RelayError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.total_size());
        item.write_into(dst);
        Ok(())
    }
}
