use std::io;
use tokio_util::bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Bytes of opcode and sequence number following the length prefix
const HEADER_LEN: usize = 6;
const MAX_FRAME: usize = 1024 * 1024;
/// Largest payload a single frame can carry
pub const MAX_PAYLOAD: usize = MAX_FRAME - HEADER_LEN;

/// One message of the stub protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubFrame {
    pub opcode: u16,
    pub seq: u32,
    pub payload: Bytes,
}

/// `[u32 len][u16 opcode][u32 seq][payload]`, all little endian.
///
/// `len` counts everything after the prefix itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubCodec;

impl Decoder for StubCodec {
    type Item = StubFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if !(HEADER_LEN..=MAX_FRAME).contains(&len) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stub frame length {len} out of range"),
            ));
        }
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let opcode = src.get_u16_le();
        let seq = src.get_u32_le();
        let payload = src.split_to(len - HEADER_LEN).freeze();
        Ok(Some(StubFrame {
            opcode,
            seq,
            payload,
        }))
    }
}

impl Encoder<StubFrame> for StubCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: StubFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = HEADER_LEN + frame.payload.len();
        if len > MAX_FRAME {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("stub frame of {len} bytes exceeds limit"),
            ));
        }

        dst.reserve(4 + len);
        dst.put_u32_le(len as u32);
        dst.put_u16_le(frame.opcode);
        dst.put_u32_le(frame.seq);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_layout() {
        let mut buf = BytesMut::new();
        StubCodec
            .encode(
                StubFrame {
                    opcode: 0x0102,
                    seq: 7,
                    payload: Bytes::from_static(&[0xAA, 0xBB]),
                },
                &mut buf,
            )
            .unwrap();

        assert_eq!(
            &buf[..],
            &[8, 0, 0, 0, 0x02, 0x01, 7, 0, 0, 0, 0xAA, 0xBB]
        );
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let mut codec = StubCodec;
        let mut buf = BytesMut::from(&[7u8, 0, 0, 0, 0x01, 0x80, 3, 0][..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(&[0, 0, 0x00]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.opcode, 0x8001);
        assert_eq!(frame.seq, 3);
        assert_eq!(&frame.payload[..], &[0x00]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_lengths() {
        let mut short = BytesMut::from(&[2u8, 0, 0, 0, 0, 0][..]);
        assert!(StubCodec.decode(&mut short).is_err());

        let mut huge = BytesMut::from(&[0xFFu8, 0xFF, 0xFF, 0x7F][..]);
        assert!(StubCodec.decode(&mut huge).is_err());
    }
}
