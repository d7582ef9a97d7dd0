use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::types::{FrameId, ReceiverId, MAX_PACKET_SIZE, RECEIVER_HEADER_SIZE};

/// Packets a receiver sends back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiverPacketType {
    /// Join (or rejoin) a session, declaring wanted streams.
    Connect = 0,
    /// Keeps the receiver's liveness timer fresh between reports.
    Heartbeat = 1,
    /// Acknowledges a delivered frame with decode timings.
    Report = 2,
    /// Asks for retransmission of specific video fragments.
    Request = 3,
}

impl ReceiverPacketType {
    pub fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        match b {
            0 => Ok(Self::Connect),
            1 => Ok(Self::Heartbeat),
            2 => Ok(Self::Report),
            3 => Ok(Self::Request),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

/// Size of a connect packet: receiver prefix (5) + flags (1).
pub const CONNECT_PACKET_SIZE: usize = 6;

/// Size of a report packet: receiver prefix (5) + frame_id (4)
/// + decoder_time_ms (4) + frame_time_ms (4).
pub const REPORT_PACKET_SIZE: usize = 17;

/// Header size of a request packet: receiver prefix (5) + frame_id (4)
/// + count (2).
pub const REQUEST_PACKET_HEADER_SIZE: usize = 11;

/// Most fragment indices one request packet can carry.
pub const MAX_REQUEST_INDICES: usize = (MAX_PACKET_SIZE - REQUEST_PACKET_HEADER_SIZE) / 2;

/// Read the type byte of a receiver packet without parsing the body.
pub fn receiver_packet_type(data: &[u8]) -> Result<ReceiverPacketType, ProtocolError> {
    if data.len() < RECEIVER_HEADER_SIZE {
        return Err(ProtocolError::PacketTooShort {
            expected: RECEIVER_HEADER_SIZE,
            got: data.len(),
        });
    }
    ReceiverPacketType::from_byte(data[4])
}

/// Read the receiver id prefix of a receiver packet.
pub fn receiver_packet_receiver_id(data: &[u8]) -> Result<ReceiverId, ProtocolError> {
    if data.len() < RECEIVER_HEADER_SIZE {
        return Err(ProtocolError::PacketTooShort {
            expected: RECEIVER_HEADER_SIZE,
            got: data.len(),
        });
    }
    Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

fn check_type(data: &[u8], expected: ReceiverPacketType) -> Result<(), ProtocolError> {
    let found = receiver_packet_type(data)?;
    if found != expected {
        return Err(ProtocolError::UnknownPacketType(data[4]));
    }
    Ok(())
}

fn put_receiver_header(buf: &mut BytesMut, receiver_id: ReceiverId, packet_type: ReceiverPacketType) {
    buf.put_u32_le(receiver_id);
    buf.put_u8(packet_type as u8);
}

/// Wire format: receiver prefix + `[flags: u8]` with bit 0 = video,
/// bit 1 = audio.
#[derive(Debug, Clone, Copy)]
pub struct ConnectReceiverPacket {
    pub receiver_id: ReceiverId,
    pub wants_video: bool,
    pub wants_audio: bool,
}

impl ConnectReceiverPacket {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(CONNECT_PACKET_SIZE);
        put_receiver_header(&mut buf, self.receiver_id, ReceiverPacketType::Connect);
        let flags = (self.wants_video as u8) | ((self.wants_audio as u8) << 1);
        buf.put_u8(flags);
        buf.freeze()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < CONNECT_PACKET_SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: CONNECT_PACKET_SIZE,
                got: data.len(),
            });
        }
        check_type(data, ReceiverPacketType::Connect)?;

        let flags = data[5];
        Ok(Self {
            receiver_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            wants_video: flags & 0b01 != 0,
            wants_audio: flags & 0b10 != 0,
        })
    }
}

/// Liveness beacon carrying only the receiver header.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatReceiverPacket {
    pub receiver_id: ReceiverId,
}

impl HeartbeatReceiverPacket {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECEIVER_HEADER_SIZE);
        put_receiver_header(&mut buf, self.receiver_id, ReceiverPacketType::Heartbeat);
        buf.freeze()
    }
}

/// Acknowledges delivery of a frame.
///
/// Wire format: receiver prefix + `[frame_id: u32] [decoder_time_ms: f32]
/// [frame_time_ms: f32]`.
#[derive(Debug, Clone, Copy)]
pub struct ReportReceiverPacket {
    pub receiver_id: ReceiverId,
    pub frame_id: FrameId,
    pub decoder_time_ms: f32,
    pub frame_time_ms: f32,
}

impl ReportReceiverPacket {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REPORT_PACKET_SIZE);
        put_receiver_header(&mut buf, self.receiver_id, ReceiverPacketType::Report);
        buf.put_u32_le(self.frame_id);
        buf.put_f32_le(self.decoder_time_ms);
        buf.put_f32_le(self.frame_time_ms);
        buf.freeze()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < REPORT_PACKET_SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: REPORT_PACKET_SIZE,
                got: data.len(),
            });
        }
        check_type(data, ReceiverPacketType::Report)?;

        Ok(Self {
            receiver_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            frame_id: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            decoder_time_ms: f32::from_le_bytes([data[9], data[10], data[11], data[12]]),
            frame_time_ms: f32::from_le_bytes([data[13], data[14], data[15], data[16]]),
        })
    }
}

/// Asks the sender to resend the listed fragments of one frame.
///
/// Wire format: receiver prefix + `[frame_id: u32] [count: u16]
/// [packet_index: u16] * count`.
#[derive(Debug, Clone)]
pub struct RequestReceiverPacket {
    pub receiver_id: ReceiverId,
    pub frame_id: FrameId,
    pub packet_indices: Vec<u16>,
}

impl RequestReceiverPacket {
    pub fn to_bytes(&self) -> Bytes {
        debug_assert!(self.packet_indices.len() <= MAX_REQUEST_INDICES);
        let mut buf =
            BytesMut::with_capacity(REQUEST_PACKET_HEADER_SIZE + 2 * self.packet_indices.len());
        put_receiver_header(&mut buf, self.receiver_id, ReceiverPacketType::Request);
        buf.put_u32_le(self.frame_id);
        buf.put_u16_le(self.packet_indices.len() as u16);
        for index in &self.packet_indices {
            buf.put_u16_le(*index);
        }
        buf.freeze()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < REQUEST_PACKET_HEADER_SIZE {
            return Err(ProtocolError::PacketTooShort {
                expected: REQUEST_PACKET_HEADER_SIZE,
                got: data.len(),
            });
        }
        check_type(data, ReceiverPacketType::Request)?;

        let count = u16::from_le_bytes([data[9], data[10]]) as usize;
        let needed = REQUEST_PACKET_HEADER_SIZE + 2 * count;
        if data.len() < needed {
            return Err(ProtocolError::PacketTooShort {
                expected: needed,
                got: data.len(),
            });
        }

        let mut packet_indices = Vec::with_capacity(count);
        for i in 0..count {
            let at = REQUEST_PACKET_HEADER_SIZE + 2 * i;
            packet_indices.push(u16::from_le_bytes([data[at], data[at + 1]]));
        }

        Ok(Self {
            receiver_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            frame_id: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            packet_indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_connect() {
        let original = ConnectReceiverPacket {
            receiver_id: 0xCAFE,
            wants_video: true,
            wants_audio: false,
        };
        let decoded = ConnectReceiverPacket::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(decoded.receiver_id, 0xCAFE);
        assert!(decoded.wants_video);
        assert!(!decoded.wants_audio);
    }

    #[test]
    fn connect_flags_both() {
        let original = ConnectReceiverPacket {
            receiver_id: 1,
            wants_video: true,
            wants_audio: true,
        };
        let bytes = original.to_bytes();
        assert_eq!(bytes[5], 0b11);
        let decoded = ConnectReceiverPacket::from_bytes(&bytes).unwrap();
        assert!(decoded.wants_video && decoded.wants_audio);
    }

    #[test]
    fn roundtrip_report() {
        let original = ReportReceiverPacket {
            receiver_id: 3,
            frame_id: 250,
            decoder_time_ms: 4.5,
            frame_time_ms: 16.6,
        };
        let decoded = ReportReceiverPacket::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(decoded.frame_id, 250);
        assert_eq!(decoded.decoder_time_ms, 4.5);
        assert_eq!(decoded.frame_time_ms, 16.6);
    }

    #[test]
    fn roundtrip_request() {
        let original = RequestReceiverPacket {
            receiver_id: 8,
            frame_id: 31,
            packet_indices: vec![0, 4, 9, 700],
        };
        let decoded = RequestReceiverPacket::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(decoded.frame_id, 31);
        assert_eq!(decoded.packet_indices, vec![0, 4, 9, 700]);
    }

    #[test]
    fn roundtrip_request_empty() {
        let original = RequestReceiverPacket {
            receiver_id: 8,
            frame_id: 1,
            packet_indices: vec![],
        };
        let decoded = RequestReceiverPacket::from_bytes(&original.to_bytes()).unwrap();
        assert!(decoded.packet_indices.is_empty());
    }

    #[test]
    fn request_with_lying_count_rejected() {
        let mut bytes = RequestReceiverPacket {
            receiver_id: 8,
            frame_id: 1,
            packet_indices: vec![1, 2],
        }
        .to_bytes()
        .to_vec();
        // Claim more indices than the packet carries.
        bytes[9] = 200;
        assert!(RequestReceiverPacket::from_bytes(&bytes).is_err());
    }

    #[test]
    fn heartbeat_is_header_only() {
        let bytes = HeartbeatReceiverPacket { receiver_id: 5 }.to_bytes();
        assert_eq!(bytes.len(), RECEIVER_HEADER_SIZE);
        assert_eq!(
            receiver_packet_type(&bytes).unwrap(),
            ReceiverPacketType::Heartbeat
        );
        assert_eq!(receiver_packet_receiver_id(&bytes).unwrap(), 5);
    }

    #[test]
    fn max_request_fits_in_a_datagram() {
        let original = RequestReceiverPacket {
            receiver_id: 1,
            frame_id: 1,
            packet_indices: (0..MAX_REQUEST_INDICES as u16).collect(),
        };
        assert!(original.to_bytes().len() <= MAX_PACKET_SIZE);
    }
}
