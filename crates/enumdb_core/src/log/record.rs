//! Record framing.

use crc32fast::Hasher;

/// Frame header size: payload_len (4) + crc32 (4).
pub const FRAME_HEADER_LEN: usize = 8;

/// Checksum of a frame: crc32 over the length field, then the payload.
///
/// Covering the length keeps an all-zero frame from checking out, since
/// `crc32("")` is 0.
pub(crate) fn frame_checksum(len: u32, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&len.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Frames a payload for appending.
pub(crate) fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u32;
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&frame_checksum(len, payload).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Splits a frame header into (payload_len, crc).
pub(crate) fn decode_frame_header(bytes: &[u8]) -> (u32, u32) {
    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    (len, crc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout() {
        let frame = encode_frame(b"alpha");
        assert_eq!(frame.len(), FRAME_HEADER_LEN + 5);

        let (len, crc) = decode_frame_header(&frame);
        assert_eq!(len, 5);
        assert_eq!(crc, frame_checksum(5, b"alpha"));
        assert_eq!(&frame[FRAME_HEADER_LEN..], b"alpha");
    }

    #[test]
    fn empty_payload_frame_is_not_all_zero() {
        let frame = encode_frame(b"");
        assert_eq!(frame.len(), FRAME_HEADER_LEN);
        assert_eq!(decode_frame_header(&frame), (0, frame_checksum(0, b"")));
        assert_ne!(frame_checksum(0, b""), 0);
    }

    #[test]
    fn checksum_covers_the_length() {
        assert_ne!(frame_checksum(5, b"alpha"), frame_checksum(6, b"alpha"));
    }
}
