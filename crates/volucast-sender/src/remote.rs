use std::net::SocketAddr;
use std::time::Instant;

use volucast_protocol::types::ReceiverId;

/// The video frame id before any report has arrived.
pub const INITIAL_ACK_FRAME_ID: i64 = -1;

/// Sender-side state for one connected receiver.
#[derive(Debug, Clone)]
pub struct RemoteReceiver {
    pub endpoint: SocketAddr,
    pub receiver_id: ReceiverId,
    pub video_requested: bool,
    pub audio_requested: bool,
    /// Highest frame id this receiver has reported delivered.
    pub last_ack_frame_id: i64,
    pub last_packet_time: Instant,
}

impl RemoteReceiver {
    pub fn new(
        endpoint: SocketAddr,
        receiver_id: ReceiverId,
        video_requested: bool,
        audio_requested: bool,
        now: Instant,
    ) -> Self {
        Self {
            endpoint,
            receiver_id,
            video_requested,
            audio_requested,
            last_ack_frame_id: INITIAL_ACK_FRAME_ID,
            last_packet_time: now,
        }
    }
}
