use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("packet too short: expected at least {expected} bytes, got {got}")]
    PacketTooShort { expected: usize, got: usize },

    #[error("unknown packet type: 0x{0:02x}")]
    UnknownPacketType(u8),

    #[error("frame message truncated: payloads need {expected} bytes, got {got}")]
    MessageTruncated { expected: usize, got: usize },

    #[error("frame message too large to fragment: {0} bytes")]
    FrameTooLarge(usize),
}
