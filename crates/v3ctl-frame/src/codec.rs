use bytes::{Buf, BufMut, BytesMut};
use v3ctl_transport::FrameBoundary;

use crate::error::{FrameError, Result};

/// Header: magic (4) + version (2) + type (2) + sequence (4) + length (4) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Protocol family identifier, "V3IP" on the wire.
pub const MAGIC: u32 = 0x5049_3356;

/// The only protocol version the core speaks.
pub const VERSION: u16 = 0x0001;

/// Upper bound on a whole frame, header included, in both directions.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Largest payload that fits in one frame.
pub const MAX_PAYLOAD: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// Where the transport finds the payload length on stream endpoints.
pub const FRAME_BOUNDARY: FrameBoundary = FrameBoundary {
    header_len: HEADER_SIZE,
    length_offset: 12,
};

/// Fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u16,
    pub msg_type: u16,
    pub sequence: u32,
    pub payload_len: u32,
}

impl Header {
    /// Header for a frame of this protocol version.
    pub fn new(msg_type: u16, sequence: u32, payload_len: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            msg_type,
            sequence,
            payload_len,
        }
    }

    fn put(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.magic);
        dst.put_u16_le(self.version);
        dst.put_u16_le(self.msg_type);
        dst.put_u32_le(self.sequence);
        dst.put_u32_le(self.payload_len);
    }

    fn parse(mut src: &[u8]) -> Self {
        Self {
            magic: src.get_u32_le(),
            version: src.get_u16_le(),
            msg_type: src.get_u16_le(),
            sequence: src.get_u32_le(),
            payload_len: src.get_u32_le(),
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (little-endian, packed):
/// ```text
/// ┌────────────┬───────────┬───────────┬────────────┬────────────┬──────────────┐
/// │ Magic (4B) │ Ver. (2B) │ Type (2B) │ Seq. (4B)  │ Len. (4B)  │ Payload      │
/// │ "V3IP"     │ 0x0001    │ opcode    │ request id │            │ (Len bytes)  │
/// └────────────┴───────────┴───────────┴────────────┴────────────┴──────────────┘
/// ```
pub fn encode_frame(
    msg_type: u16,
    sequence: u32,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    Header::new(msg_type, sequence, payload.len() as u32).put(dst);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from `src`.
///
/// The payload is a view into `src` of `min(payload_len, available)` bytes;
/// the declared length is never trusted past what was actually received.
pub fn decode_frame(src: &[u8]) -> Result<(Header, &[u8])> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::ShortFrame {
            len: src.len(),
            header: HEADER_SIZE,
        });
    }

    let header = Header::parse(&src[..HEADER_SIZE]);
    if header.magic != MAGIC {
        return Err(FrameError::BadMagic {
            found: header.magic,
            expected: MAGIC,
        });
    }
    if header.version != VERSION {
        return Err(FrameError::UnsupportedVersion {
            found: header.version,
            expected: VERSION,
        });
    }

    let body = &src[HEADER_SIZE..];
    let len = (header.payload_len as usize).min(body.len());
    Ok((header, &body[..len]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{PING, STATE};

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(STATE, 0xDEAD_BEEF, &2u32.to_le_bytes(), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 4);

        let (header, payload) = decode_frame(&buf).unwrap();
        assert_eq!(header.msg_type, STATE);
        assert_eq!(header.sequence, 0xDEAD_BEEF);
        assert_eq!(header.payload_len, 4);
        assert_eq!(payload, &2u32.to_le_bytes());
    }

    #[test]
    fn test_wire_layout_is_packed_little_endian() {
        let mut buf = BytesMut::new();
        encode_frame(PING, 0x0403_0201, b"", &mut buf).unwrap();
        assert_eq!(
            buf.as_ref(),
            &[
                0x56, 0x33, 0x49, 0x50, // magic "V3IP"
                0x01, 0x00, // version
                0x00, 0x01, // PING
                0x01, 0x02, 0x03, 0x04, // sequence
                0x00, 0x00, 0x00, 0x00, // payload length
            ]
        );
    }

    #[test]
    fn test_decode_short_frame() {
        let result = decode_frame(&[0x56, 0x33, 0x49]);
        assert!(matches!(
            result,
            Err(FrameError::ShortFrame { len: 3, .. })
        ));
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut buf = BytesMut::new();
        encode_frame(PING, 1, b"payload", &mut buf).unwrap();
        buf[0] ^= 0xFF;
        assert!(matches!(
            decode_frame(&buf),
            Err(FrameError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_decode_unsupported_version() {
        let mut buf = BytesMut::new();
        encode_frame(PING, 1, b"", &mut buf).unwrap();
        buf[4] = 0x02;
        assert!(matches!(
            decode_frame(&buf),
            Err(FrameError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_declared_length_is_clamped_to_available() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u16_le(STATE);
        buf.put_u32_le(7);
        buf.put_u32_le(u32::MAX);
        buf.put_slice(b"abc");

        let (header, payload) = decode_frame(&buf).unwrap();
        assert_eq!(header.payload_len, u32::MAX);
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn test_payload_too_large() {
        let mut buf = BytesMut::new();
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let result = encode_frame(PING, 1, &payload, &mut buf);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_max_payload_fills_max_frame() {
        let mut buf = BytesMut::new();
        encode_frame(PING, 1, &vec![0xAB; MAX_PAYLOAD], &mut buf).unwrap();
        assert_eq!(buf.len(), MAX_FRAME_SIZE);
    }

    #[test]
    fn test_boundary_matches_header_layout() {
        let mut buf = BytesMut::new();
        encode_frame(PING, 9, b"12345", &mut buf).unwrap();
        assert_eq!(FRAME_BOUNDARY.declared_len(&buf[..HEADER_SIZE]), 5);
    }
}
