use std::collections::HashMap;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tracing::warn;

use volucast_protocol::fec::recover_fragment;
use volucast_protocol::sender::{ParitySenderPacket, VideoSenderPacket};
use volucast_protocol::types::FrameId;

/// Per-frame fragment collection: video fragment slots plus the parity
/// packets covering them.
pub struct FrameCollection {
    frame_id: FrameId,
    packet_count: Option<u16>,
    video: Vec<Option<Bytes>>,
    /// Parity packets keyed by group start index.
    parity: HashMap<u16, ParitySenderPacket>,
    pub creation: Instant,
    pub last_request: Option<Instant>,
}

impl FrameCollection {
    pub fn new(frame_id: FrameId, now: Instant) -> Self {
        Self {
            frame_id,
            packet_count: None,
            video: Vec::new(),
            parity: HashMap::new(),
            creation: now,
            last_request: None,
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn packet_count(&self) -> Option<u16> {
        self.packet_count
    }

    pub fn add_video(&mut self, packet: VideoSenderPacket) {
        match self.packet_count {
            None => {
                self.packet_count = Some(packet.packet_count);
                self.video = vec![None; packet.packet_count as usize];
            }
            Some(count) if count != packet.packet_count => {
                warn!(
                    frame_id = self.frame_id,
                    "conflicting packet count {} vs {count}, packet dropped",
                    packet.packet_count
                );
                return;
            }
            Some(_) => {}
        }

        let index = packet.packet_index as usize;
        if let Some(slot) = self.video.get_mut(index) {
            if slot.is_none() {
                *slot = Some(packet.payload);
            }
        }
    }

    pub fn add_parity(&mut self, packet: ParitySenderPacket) {
        self.parity.entry(packet.group_start_index).or_insert(packet);
    }

    /// XOR-recover every parity group missing exactly one fragment.
    /// Returns how many fragments were reconstructed.
    pub fn try_recover(&mut self) -> usize {
        let Some(count) = self.packet_count else {
            return 0;
        };

        let mut recovered = 0;
        for parity in self.parity.values() {
            let start = parity.group_start_index as usize;
            let end = (start + parity.group_size as usize).min(count as usize);
            if start >= end {
                continue;
            }

            let missing: Vec<usize> = (start..end)
                .filter(|&i| self.video[i].is_none())
                .collect();
            if missing.len() != 1 {
                continue;
            }

            let present: Vec<&[u8]> = (start..end)
                .filter(|&i| i != missing[0])
                .filter_map(|i| self.video[i].as_deref())
                .collect();
            let fragment = recover_fragment(&parity.payload, &present);
            self.video[missing[0]] = Some(Bytes::from(fragment));
            recovered += 1;
        }
        recovered
    }

    pub fn is_complete(&self) -> bool {
        self.packet_count.is_some() && self.video.iter().all(Option::is_some)
    }

    pub fn missing_indices(&self) -> Vec<u16> {
        self.video
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i as u16)
            .collect()
    }

    /// Concatenate the fragments in index order.
    pub fn assemble(&self) -> Option<Bytes> {
        if !self.is_complete() {
            return None;
        }
        let total: usize = self.video.iter().flatten().map(Bytes::len).sum();
        let mut message = BytesMut::with_capacity(total);
        for fragment in self.video.iter().flatten() {
            message.extend_from_slice(fragment);
        }
        Some(message.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volucast_protocol::fec::make_parity_packets;
    use volucast_protocol::sender::fragment_frame;
    use volucast_protocol::types::{MAX_VIDEO_FRAGMENT_SIZE, XOR_MAX_GROUP_SIZE};

    fn frame_packets(len: usize) -> (Bytes, Vec<VideoSenderPacket>, Vec<ParitySenderPacket>) {
        let message = Bytes::from((0..len).map(|i| (i % 253) as u8).collect::<Vec<_>>());
        let video = fragment_frame(1, 5, &message).unwrap();
        let parity = make_parity_packets(1, 5, XOR_MAX_GROUP_SIZE, &video);
        (message, video, parity)
    }

    #[test]
    fn assembles_when_all_fragments_arrive() {
        let (message, video, _) = frame_packets(MAX_VIDEO_FRAGMENT_SIZE * 2 + 77);
        let mut collection = FrameCollection::new(5, Instant::now());

        for packet in video {
            collection.add_video(packet);
        }
        assert!(collection.is_complete());
        assert_eq!(collection.assemble().unwrap(), message);
    }

    #[test]
    fn duplicate_fragments_harmless() {
        let (message, video, _) = frame_packets(3000);
        let mut collection = FrameCollection::new(5, Instant::now());
        for packet in &video {
            collection.add_video(packet.clone());
            collection.add_video(packet.clone());
        }
        assert_eq!(collection.assemble().unwrap(), message);
    }

    #[test]
    fn recovers_single_loss_per_group() {
        let (message, video, parity) = frame_packets(MAX_VIDEO_FRAGMENT_SIZE * 6 + 123);
        let mut collection = FrameCollection::new(5, Instant::now());

        // Drop one fragment in each parity group (indices 2 and 6).
        for packet in video.iter().filter(|p| p.packet_index != 2 && p.packet_index != 6) {
            collection.add_video(packet.clone());
        }
        for packet in parity {
            collection.add_parity(packet);
        }
        assert!(!collection.is_complete());
        assert_eq!(collection.missing_indices(), vec![2, 6]);

        assert_eq!(collection.try_recover(), 2);
        assert!(collection.is_complete());

        // The terminal fragment (6) keeps parity length padding; the
        // embedded sizes make it inert, but the prefix must be exact.
        let assembled = collection.assemble().unwrap();
        assert_eq!(&assembled[..message.len()], &message[..]);
    }

    #[test]
    fn two_losses_in_a_group_stay_missing() {
        let (_, video, parity) = frame_packets(MAX_VIDEO_FRAGMENT_SIZE * 4 + 1);
        let mut collection = FrameCollection::new(5, Instant::now());

        for packet in video.iter().filter(|p| p.packet_index > 1) {
            collection.add_video(packet.clone());
        }
        for packet in parity {
            collection.add_parity(packet);
        }

        assert_eq!(collection.try_recover(), 0);
        assert_eq!(collection.missing_indices(), vec![0, 1]);
    }

    #[test]
    fn parity_before_any_video_is_held() {
        let (message, video, parity) = frame_packets(2000);
        let mut collection = FrameCollection::new(5, Instant::now());

        for packet in parity {
            collection.add_parity(packet);
        }
        assert_eq!(collection.try_recover(), 0, "packet count still unknown");

        // With a 2-fragment frame, one fragment plus parity completes it.
        collection.add_video(video[0].clone());
        assert_eq!(collection.try_recover(), 1);
        let assembled = collection.assemble().unwrap();
        assert_eq!(&assembled[..message.len()], &message[..]);
    }

    #[test]
    fn out_of_range_index_ignored() {
        let mut collection = FrameCollection::new(1, Instant::now());
        collection.add_video(VideoSenderPacket {
            session_id: 1,
            frame_id: 1,
            packet_index: 0,
            packet_count: 2,
            payload: Bytes::from_static(&[1]),
        });
        collection.add_video(VideoSenderPacket {
            session_id: 1,
            frame_id: 1,
            packet_index: 9,
            packet_count: 2,
            payload: Bytes::from_static(&[2]),
        });
        assert!(!collection.is_complete());
        assert_eq!(collection.missing_indices(), vec![1]);
    }
}
