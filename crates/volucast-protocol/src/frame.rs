use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::types::FrameId;

/// Fixed bytes of a frame message: timestamp (4) + keyframe (1) + two size
/// prefixes (4 + 4).
pub const FRAME_MESSAGE_FIXED_SIZE: usize = 13;

/// The per-frame container binding one color payload and one depth payload.
///
/// Wire format (little-endian, packed):
/// ```text
/// [frame_timestamp_ms: f32] [keyframe: u8] [color_size: u32] [color bytes]
/// [depth_size: u32] [depth bytes]
/// ```
///
/// The frame id is not part of the message itself; it travels in the video
/// packet headers that carry the message's fragments.
#[derive(Debug, Clone)]
pub struct FrameMessage {
    pub frame_id: FrameId,
    pub frame_timestamp_ms: f32,
    pub keyframe: bool,
    pub color_bytes: Bytes,
    pub depth_bytes: Bytes,
}

impl FrameMessage {
    pub fn new(
        frame_id: FrameId,
        frame_timestamp_ms: f32,
        keyframe: bool,
        color_bytes: Bytes,
        depth_bytes: Bytes,
    ) -> Self {
        Self {
            frame_id,
            frame_timestamp_ms,
            keyframe,
            color_bytes,
            depth_bytes,
        }
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        FRAME_MESSAGE_FIXED_SIZE + self.color_bytes.len() + self.depth_bytes.len()
    }

    /// Serialize into one contiguous message buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        buf.put_f32_le(self.frame_timestamp_ms);
        buf.put_u8(self.keyframe as u8);
        buf.put_u32_le(self.color_bytes.len() as u32);
        buf.extend_from_slice(&self.color_bytes);
        buf.put_u32_le(self.depth_bytes.len() as u32);
        buf.extend_from_slice(&self.depth_bytes);
        buf.freeze()
    }

    /// Parse a reassembled message buffer.
    ///
    /// Bytes past the depth payload are ignored: a terminal fragment
    /// reconstructed from parity can carry zero padding, and the embedded
    /// sizes make that padding inert.
    pub fn from_bytes(frame_id: FrameId, message: Bytes) -> Result<Self, ProtocolError> {
        if message.len() < FRAME_MESSAGE_FIXED_SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: FRAME_MESSAGE_FIXED_SIZE,
                got: message.len(),
            });
        }

        let frame_timestamp_ms =
            f32::from_le_bytes([message[0], message[1], message[2], message[3]]);
        let keyframe = message[4] != 0;
        let color_size =
            u32::from_le_bytes([message[5], message[6], message[7], message[8]]) as usize;

        let color_end = 9 + color_size;
        if message.len() < color_end + 4 {
            return Err(ProtocolError::MessageTruncated {
                expected: color_end + 4,
                got: message.len(),
            });
        }

        let depth_size = u32::from_le_bytes([
            message[color_end],
            message[color_end + 1],
            message[color_end + 2],
            message[color_end + 3],
        ]) as usize;

        let depth_start = color_end + 4;
        let depth_end = depth_start + depth_size;
        if message.len() < depth_end {
            return Err(ProtocolError::MessageTruncated {
                expected: depth_end,
                got: message.len(),
            });
        }

        Ok(Self {
            frame_id,
            frame_timestamp_ms,
            keyframe,
            color_bytes: message.slice(9..color_end),
            depth_bytes: message.slice(depth_start..depth_end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let original = FrameMessage::new(
            7,
            123.5,
            true,
            Bytes::from_static(&[1, 2, 3]),
            Bytes::from_static(&[4, 5, 6, 7, 8]),
        );
        let bytes = original.to_bytes();
        assert_eq!(bytes.len(), FRAME_MESSAGE_FIXED_SIZE + 3 + 5);

        let decoded = FrameMessage::from_bytes(7, bytes).unwrap();
        assert_eq!(decoded.frame_id, 7);
        assert_eq!(decoded.frame_timestamp_ms, 123.5);
        assert!(decoded.keyframe);
        assert_eq!(&decoded.color_bytes[..], &[1, 2, 3]);
        assert_eq!(&decoded.depth_bytes[..], &[4, 5, 6, 7, 8]);
    }

    #[test]
    fn roundtrip_empty_payloads() {
        let original = FrameMessage::new(0, 0.0, false, Bytes::new(), Bytes::new());
        let bytes = original.to_bytes();
        assert_eq!(bytes.len(), FRAME_MESSAGE_FIXED_SIZE);

        let decoded = FrameMessage::from_bytes(0, bytes).unwrap();
        assert!(!decoded.keyframe);
        assert!(decoded.color_bytes.is_empty());
        assert!(decoded.depth_bytes.is_empty());
    }

    #[test]
    fn trailing_padding_ignored() {
        let original = FrameMessage::new(
            1,
            1.0,
            false,
            Bytes::from_static(&[9, 9]),
            Bytes::from_static(&[8, 8, 8]),
        );
        let mut padded = original.to_bytes().to_vec();
        padded.extend_from_slice(&[0, 0, 0, 0]);

        let decoded = FrameMessage::from_bytes(1, Bytes::from(padded)).unwrap();
        assert_eq!(&decoded.color_bytes[..], &[9, 9]);
        assert_eq!(&decoded.depth_bytes[..], &[8, 8, 8]);
    }

    #[test]
    fn truncated_color_payload() {
        let original = FrameMessage::new(
            1,
            1.0,
            true,
            Bytes::from_static(&[1, 2, 3, 4]),
            Bytes::new(),
        );
        let bytes = original.to_bytes();
        let truncated = bytes.slice(..bytes.len() - 6);
        assert!(FrameMessage::from_bytes(1, truncated).is_err());
    }

    #[test]
    fn too_short_for_header() {
        assert!(FrameMessage::from_bytes(0, Bytes::from_static(&[0; 12])).is_err());
    }
}
