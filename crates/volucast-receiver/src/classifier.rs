use tracing::warn;

use volucast_net::Datagram;
use volucast_protocol::sender::{
    sender_packet_type, sender_session_id, AudioSenderPacket, ParitySenderPacket,
    SenderPacketType, VideoSenderPacket,
};
use volucast_protocol::types::SessionId;

/// One drain's worth of sender packets, sorted by kind.
#[derive(Debug, Default)]
pub struct SenderPacketSet {
    pub video_packets: Vec<VideoSenderPacket>,
    pub parity_packets: Vec<ParitySenderPacket>,
    pub audio_packets: Vec<AudioSenderPacket>,
    /// Session ids seen on heartbeats; heartbeats carry nothing else.
    pub heartbeats: Vec<SessionId>,
    /// Datagrams dropped for bad headers or truncated bodies.
    pub malformed: usize,
}

impl SenderPacketSet {
    pub fn received_any(&self) -> bool {
        !self.video_packets.is_empty()
            || !self.parity_packets.is_empty()
            || !self.audio_packets.is_empty()
            || !self.heartbeats.is_empty()
    }
}

/// Sort one batch of datagrams into a [`SenderPacketSet`].
pub fn classify_sender_packets(datagrams: &[Datagram]) -> SenderPacketSet {
    let mut set = SenderPacketSet::default();

    for datagram in datagrams {
        let packet_type = match sender_packet_type(&datagram.bytes) {
            Ok(t) => t,
            Err(e) => {
                warn!(addr = %datagram.addr, "dropping sender packet: {e}");
                set.malformed += 1;
                continue;
            }
        };

        let parsed = match packet_type {
            SenderPacketType::Heartbeat => sender_session_id(&datagram.bytes)
                .map(|session_id| set.heartbeats.push(session_id)),
            SenderPacketType::Video => VideoSenderPacket::from_bytes(&datagram.bytes)
                .map(|packet| set.video_packets.push(packet)),
            SenderPacketType::Parity => ParitySenderPacket::from_bytes(&datagram.bytes)
                .map(|packet| set.parity_packets.push(packet)),
            SenderPacketType::Audio => AudioSenderPacket::from_bytes(&datagram.bytes)
                .map(|packet| set.audio_packets.push(packet)),
        };

        if let Err(e) = parsed {
            warn!(addr = %datagram.addr, "dropping sender packet: {e}");
            set.malformed += 1;
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use volucast_protocol::sender::HeartbeatSenderPacket;

    fn datagram(bytes: Bytes) -> Datagram {
        Datagram {
            bytes,
            addr: "127.0.0.1:9750".parse().unwrap(),
        }
    }

    #[test]
    fn classifies_each_kind() {
        let video = VideoSenderPacket {
            session_id: 7,
            frame_id: 1,
            packet_index: 0,
            packet_count: 1,
            payload: Bytes::from_static(&[1]),
        };
        let parity = ParitySenderPacket {
            session_id: 7,
            frame_id: 1,
            group_start_index: 0,
            group_size: 1,
            payload: Bytes::from_static(&[1]),
        };
        let audio = AudioSenderPacket {
            session_id: 7,
            frame_id: 0,
            opus_bytes: Bytes::from_static(&[2, 3]),
        };

        let set = classify_sender_packets(&[
            datagram(video.to_bytes()),
            datagram(parity.to_bytes()),
            datagram(audio.to_bytes()),
            datagram(HeartbeatSenderPacket { session_id: 7 }.to_bytes()),
        ]);

        assert_eq!(set.video_packets.len(), 1);
        assert_eq!(set.parity_packets.len(), 1);
        assert_eq!(set.audio_packets.len(), 1);
        assert_eq!(set.heartbeats, vec![7]);
        assert_eq!(set.malformed, 0);
        assert!(set.received_any());
    }

    #[test]
    fn malformed_counted_not_fatal() {
        let set = classify_sender_packets(&[
            datagram(Bytes::from_static(&[0, 0, 0, 0, 9])),
            datagram(Bytes::from_static(&[1])),
        ]);
        assert_eq!(set.malformed, 2);
        assert!(!set.received_any());
    }
}
