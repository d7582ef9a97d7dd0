/// Session identifier, chosen at random by the sender at startup.
pub type SessionId = u32;

/// Receiver identifier, chosen at random by each receiver at startup.
pub type ReceiverId = u32;

/// Video frame id, monotonically increasing within one session.
pub type FrameId = u32;

/// Largest datagram the protocol ever produces.
pub const MAX_PACKET_SIZE: usize = 1500;

/// Common prefix of every sender packet: session_id (4) + type (1).
pub const SENDER_HEADER_SIZE: usize = 5;

/// Common prefix of every receiver packet: receiver_id (4) + type (1).
pub const RECEIVER_HEADER_SIZE: usize = 5;

/// Largest fragment payload carried by one video packet.
pub const MAX_VIDEO_FRAGMENT_SIZE: usize = MAX_PACKET_SIZE - 17;

/// Fragments covered by one XOR parity packet.
pub const XOR_MAX_GROUP_SIZE: usize = 5;
