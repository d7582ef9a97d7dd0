//! XOR forward error correction over video fragments.
//!
//! Fragments are grouped in send order; each group of up to
//! [`XOR_MAX_GROUP_SIZE`](crate::types::XOR_MAX_GROUP_SIZE) fragments
//! yields one parity packet whose payload is the XOR of the group's
//! fragment payloads, zero-padded to the longest fragment in the group.
//! Losing exactly one fragment of a group is recoverable without
//! retransmission.

use bytes::Bytes;

use crate::sender::{ParitySenderPacket, VideoSenderPacket};
use crate::types::{FrameId, SessionId};

fn xor_into(acc: &mut [u8], data: &[u8]) {
    for (a, b) in acc.iter_mut().zip(data) {
        *a ^= b;
    }
}

/// Build the parity packets for one frame's video packets.
pub fn make_parity_packets(
    session_id: SessionId,
    frame_id: FrameId,
    max_group_size: usize,
    video_packets: &[VideoSenderPacket],
) -> Vec<ParitySenderPacket> {
    video_packets
        .chunks(max_group_size)
        .enumerate()
        .map(|(group, packets)| {
            let parity_len = packets
                .iter()
                .map(|p| p.payload.len())
                .max()
                .unwrap_or(0);
            let mut parity = vec![0u8; parity_len];
            for packet in packets {
                xor_into(&mut parity, &packet.payload);
            }
            ParitySenderPacket {
                session_id,
                frame_id,
                group_start_index: (group * max_group_size) as u16,
                group_size: packets.len() as u8,
                payload: Bytes::from(parity),
            }
        })
        .collect()
}

/// Reconstruct the one missing fragment of a parity group.
///
/// `present` holds the payloads of the group's other fragments, in any
/// order. The result has the parity payload's length; if the missing
/// fragment was the frame's terminal one its true bytes are a prefix and
/// the tail is zero padding.
pub fn recover_fragment(parity_payload: &[u8], present: &[&[u8]]) -> Vec<u8> {
    let mut fragment = parity_payload.to_vec();
    for payload in present {
        xor_into(&mut fragment, payload);
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::fragment_frame;
    use crate::types::{MAX_VIDEO_FRAGMENT_SIZE, XOR_MAX_GROUP_SIZE};

    fn packets_for(message_len: usize) -> Vec<VideoSenderPacket> {
        let message: Vec<u8> = (0..message_len).map(|i| (i * 31 % 256) as u8).collect();
        fragment_frame(1, 1, &Bytes::from(message)).unwrap()
    }

    #[test]
    fn group_partitioning() {
        // 7 fragments -> one full group of 5 and a trailing group of 2.
        let packets = packets_for(MAX_VIDEO_FRAGMENT_SIZE * 6 + 100);
        assert_eq!(packets.len(), 7);

        let parity = make_parity_packets(1, 1, XOR_MAX_GROUP_SIZE, &packets);
        assert_eq!(parity.len(), 2);
        assert_eq!(parity[0].group_start_index, 0);
        assert_eq!(parity[0].group_size, 5);
        assert_eq!(parity[0].payload.len(), MAX_VIDEO_FRAGMENT_SIZE);
        assert_eq!(parity[1].group_start_index, 5);
        assert_eq!(parity[1].group_size, 2);
    }

    #[test]
    fn recovers_any_single_loss() {
        let packets = packets_for(MAX_VIDEO_FRAGMENT_SIZE * 3 + 57);
        let parity = make_parity_packets(1, 1, XOR_MAX_GROUP_SIZE, &packets);
        assert_eq!(parity.len(), 1);

        for missing in 0..packets.len() {
            let present: Vec<&[u8]> = packets
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != missing)
                .map(|(_, p)| &p.payload[..])
                .collect();
            let recovered = recover_fragment(&parity[0].payload, &present);

            let expected = &packets[missing].payload;
            assert_eq!(&recovered[..expected.len()], &expected[..]);
            // Anything past the true length is zero padding.
            assert!(recovered[expected.len()..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn recovers_in_every_group_of_a_long_frame() {
        let packets = packets_for(MAX_VIDEO_FRAGMENT_SIZE * 11 + 3);
        let parity = make_parity_packets(1, 1, XOR_MAX_GROUP_SIZE, &packets);
        assert_eq!(parity.len(), 3);

        for p in &parity {
            let start = p.group_start_index as usize;
            let group = &packets[start..start + p.group_size as usize];
            let missing = start + group.len() - 1;

            let present: Vec<&[u8]> = group
                .iter()
                .filter(|v| (v.packet_index as usize) != missing)
                .map(|v| &v.payload[..])
                .collect();
            let recovered = recover_fragment(&p.payload, &present);
            let expected = &packets[missing].payload;
            assert_eq!(&recovered[..expected.len()], &expected[..]);
        }
    }

    #[test]
    fn single_fragment_group() {
        let packets = packets_for(40);
        let parity = make_parity_packets(1, 1, XOR_MAX_GROUP_SIZE, &packets);
        assert_eq!(parity.len(), 1);
        assert_eq!(parity[0].group_size, 1);
        // With nothing else present the parity IS the fragment.
        let recovered = recover_fragment(&parity[0].payload, &[]);
        assert_eq!(recovered, packets[0].payload.to_vec());
    }
}
