use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::types::{
    FrameId, SessionId, MAX_VIDEO_FRAGMENT_SIZE, SENDER_HEADER_SIZE,
};

/// Packets a sender emits over UDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SenderPacketType {
    /// Keeps the session visible to receivers between frames.
    Heartbeat = 0,
    /// One fragment of a frame message.
    Video = 1,
    /// XOR parity over a group of video fragments.
    Parity = 2,
    /// One Opus-encoded audio frame.
    Audio = 3,
}

impl SenderPacketType {
    pub fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        match b {
            0 => Ok(Self::Heartbeat),
            1 => Ok(Self::Video),
            2 => Ok(Self::Parity),
            3 => Ok(Self::Audio),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

/// Header size of a video packet: sender prefix (5) + frame_id (4)
/// + packet_index (2) + packet_count (2).
pub const VIDEO_PACKET_HEADER_SIZE: usize = 13;

/// Header size of a parity packet: sender prefix (5) + frame_id (4)
/// + group_start_index (2) + group_size (1).
pub const PARITY_PACKET_HEADER_SIZE: usize = 12;

/// Header size of an audio packet: sender prefix (5) + frame_id (4).
pub const AUDIO_PACKET_HEADER_SIZE: usize = 9;

/// Read the type byte of a sender packet without parsing the body.
pub fn sender_packet_type(data: &[u8]) -> Result<SenderPacketType, ProtocolError> {
    if data.len() < SENDER_HEADER_SIZE {
        return Err(ProtocolError::PacketTooShort {
            expected: SENDER_HEADER_SIZE,
            got: data.len(),
        });
    }
    SenderPacketType::from_byte(data[4])
}

/// Read the session id prefix of a sender packet.
pub fn sender_session_id(data: &[u8]) -> Result<SessionId, ProtocolError> {
    if data.len() < SENDER_HEADER_SIZE {
        return Err(ProtocolError::PacketTooShort {
            expected: SENDER_HEADER_SIZE,
            got: data.len(),
        });
    }
    Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

fn check_type(data: &[u8], expected: SenderPacketType) -> Result<(), ProtocolError> {
    let found = sender_packet_type(data)?;
    if found != expected {
        return Err(ProtocolError::UnknownPacketType(data[4]));
    }
    Ok(())
}

fn put_sender_header(buf: &mut BytesMut, session_id: SessionId, packet_type: SenderPacketType) {
    buf.put_u32_le(session_id);
    buf.put_u8(packet_type as u8);
}

/// One fragment of a frame message.
///
/// Wire format:
/// ```text
/// [session_id: u32] [1: u8] [frame_id: u32] [packet_index: u16]
/// [packet_count: u16] [fragment bytes]
/// ```
///
/// Concatenating the fragments of a frame in index order reproduces the
/// frame message exactly. Every fragment except the last is
/// [`MAX_VIDEO_FRAGMENT_SIZE`] bytes.
#[derive(Debug, Clone)]
pub struct VideoSenderPacket {
    pub session_id: SessionId,
    pub frame_id: FrameId,
    pub packet_index: u16,
    pub packet_count: u16,
    pub payload: Bytes,
}

impl VideoSenderPacket {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(VIDEO_PACKET_HEADER_SIZE + self.payload.len());
        put_sender_header(&mut buf, self.session_id, SenderPacketType::Video);
        buf.put_u32_le(self.frame_id);
        buf.put_u16_le(self.packet_index);
        buf.put_u16_le(self.packet_count);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    pub fn from_bytes(data: &Bytes) -> Result<Self, ProtocolError> {
        if data.len() < VIDEO_PACKET_HEADER_SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: VIDEO_PACKET_HEADER_SIZE,
                got: data.len(),
            });
        }
        check_type(data, SenderPacketType::Video)?;

        Ok(Self {
            session_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            frame_id: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            packet_index: u16::from_le_bytes([data[9], data[10]]),
            packet_count: u16::from_le_bytes([data[11], data[12]]),
            payload: data.slice(VIDEO_PACKET_HEADER_SIZE..),
        })
    }
}

/// Slice a frame message into video packets of at most
/// [`MAX_VIDEO_FRAGMENT_SIZE`] payload bytes each.
pub fn fragment_frame(
    session_id: SessionId,
    frame_id: FrameId,
    message: &Bytes,
) -> Result<Vec<VideoSenderPacket>, ProtocolError> {
    let packet_count = message.len().div_ceil(MAX_VIDEO_FRAGMENT_SIZE).max(1);
    if packet_count > u16::MAX as usize {
        return Err(ProtocolError::FrameTooLarge(message.len()));
    }

    let mut packets = Vec::with_capacity(packet_count);
    for i in 0..packet_count {
        let start = i * MAX_VIDEO_FRAGMENT_SIZE;
        let end = (start + MAX_VIDEO_FRAGMENT_SIZE).min(message.len());
        packets.push(VideoSenderPacket {
            session_id,
            frame_id,
            packet_index: i as u16,
            packet_count: packet_count as u16,
            payload: message.slice(start..end),
        });
    }
    Ok(packets)
}

/// XOR parity over one group of video fragments.
///
/// Wire format:
/// ```text
/// [session_id: u32] [2: u8] [frame_id: u32] [group_start_index: u16]
/// [group_size: u8] [parity bytes]
/// ```
///
/// The parity payload is as long as the longest fragment in the group;
/// shorter fragments count as zero-padded.
#[derive(Debug, Clone)]
pub struct ParitySenderPacket {
    pub session_id: SessionId,
    pub frame_id: FrameId,
    pub group_start_index: u16,
    pub group_size: u8,
    pub payload: Bytes,
}

impl ParitySenderPacket {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PARITY_PACKET_HEADER_SIZE + self.payload.len());
        put_sender_header(&mut buf, self.session_id, SenderPacketType::Parity);
        buf.put_u32_le(self.frame_id);
        buf.put_u16_le(self.group_start_index);
        buf.put_u8(self.group_size);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    pub fn from_bytes(data: &Bytes) -> Result<Self, ProtocolError> {
        if data.len() < PARITY_PACKET_HEADER_SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: PARITY_PACKET_HEADER_SIZE,
                got: data.len(),
            });
        }
        check_type(data, SenderPacketType::Parity)?;

        Ok(Self {
            session_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            frame_id: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            group_start_index: u16::from_le_bytes([data[9], data[10]]),
            group_size: data[11],
            payload: data.slice(PARITY_PACKET_HEADER_SIZE..),
        })
    }
}

/// One Opus-encoded audio frame, fire-and-forget.
///
/// Wire format:
/// ```text
/// [session_id: u32] [3: u8] [frame_id: u32] [opus bytes]
/// ```
#[derive(Debug, Clone)]
pub struct AudioSenderPacket {
    pub session_id: SessionId,
    pub frame_id: FrameId,
    pub opus_bytes: Bytes,
}

impl AudioSenderPacket {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(AUDIO_PACKET_HEADER_SIZE + self.opus_bytes.len());
        put_sender_header(&mut buf, self.session_id, SenderPacketType::Audio);
        buf.put_u32_le(self.frame_id);
        buf.extend_from_slice(&self.opus_bytes);
        buf.freeze()
    }

    pub fn from_bytes(data: &Bytes) -> Result<Self, ProtocolError> {
        if data.len() < AUDIO_PACKET_HEADER_SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: AUDIO_PACKET_HEADER_SIZE,
                got: data.len(),
            });
        }
        check_type(data, SenderPacketType::Audio)?;

        Ok(Self {
            session_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            frame_id: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            opus_bytes: data.slice(AUDIO_PACKET_HEADER_SIZE..),
        })
    }
}

/// Liveness beacon carrying only the sender header.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSenderPacket {
    pub session_id: SessionId,
}

impl HeartbeatSenderPacket {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SENDER_HEADER_SIZE);
        put_sender_header(&mut buf, self.session_id, SenderPacketType::Heartbeat);
        buf.freeze()
    }
}
