use std::collections::HashMap;
use std::time::{Duration, Instant};

use volucast_protocol::sender::{ParitySenderPacket, VideoSenderPacket};
use volucast_protocol::types::FrameId;

/// One frame's packets, retained for retransmission.
pub struct VideoFramePackets {
    pub video_packets: Vec<VideoSenderPacket>,
    pub parity_packets: Vec<ParitySenderPacket>,
    pub creation: Instant,
}

/// Retransmission store. Entries leave when every live receiver has
/// acknowledged the frame, or when they outlive the retention window,
/// whichever comes first.
#[derive(Default)]
pub struct VideoPacketStorage {
    frames: HashMap<FrameId, VideoFramePackets>,
}

impl VideoPacketStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        frame_id: FrameId,
        video_packets: Vec<VideoSenderPacket>,
        parity_packets: Vec<ParitySenderPacket>,
        now: Instant,
    ) {
        self.frames.insert(
            frame_id,
            VideoFramePackets {
                video_packets,
                parity_packets,
                creation: now,
            },
        );
    }

    pub fn get(&self, frame_id: FrameId) -> Option<&VideoFramePackets> {
        self.frames.get(&frame_id)
    }

    pub fn cleanup(&mut self, min_ack_frame_id: i64, retention: Duration, now: Instant) {
        self.frames.retain(|&frame_id, entry| {
            (frame_id as i64) > min_ack_frame_id
                && now.duration_since(entry.creation) <= retention
        });
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acked_frames_leave() {
        let now = Instant::now();
        let mut storage = VideoPacketStorage::new();
        for id in 0..5 {
            storage.add(id, Vec::new(), Vec::new(), now);
        }

        storage.cleanup(2, Duration::from_secs(3), now);
        assert_eq!(storage.len(), 2);
        assert!(storage.get(2).is_none());
        assert!(storage.get(3).is_some());
        assert!(storage.get(4).is_some());
    }

    #[test]
    fn stale_frames_leave_even_unacked() {
        let now = Instant::now();
        let mut storage = VideoPacketStorage::new();
        storage.add(0, Vec::new(), Vec::new(), now);
        storage.add(1, Vec::new(), Vec::new(), now + Duration::from_secs(4));

        storage.cleanup(-1, Duration::from_secs(3), now + Duration::from_secs(4));
        assert!(storage.get(0).is_none(), "older than the retention window");
        assert!(storage.get(1).is_some());
    }

    #[test]
    fn no_acks_keeps_everything_fresh() {
        let now = Instant::now();
        let mut storage = VideoPacketStorage::new();
        storage.add(0, Vec::new(), Vec::new(), now);
        storage.cleanup(-1, Duration::from_secs(3), now);
        assert_eq!(storage.len(), 1);
    }
}
