//! Drives the sender packetization path into the receiver recovery path
//! in-process, with deterministic loss patterns.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use volucast_net::SessionClock;
use volucast_protocol::receiver::RequestReceiverPacket;
use volucast_protocol::sender::VideoSenderPacket;
use volucast_protocol::types::{FrameId, MAX_PACKET_SIZE};
use volucast_receiver::color::RawColorDecoder;
use volucast_receiver::decode::VideoDecodePipeline;
use volucast_receiver::recover::VideoMessageAssembler;
use volucast_sender::capture::SyntheticSource;
use volucast_sender::classifier::{ConnectInfo, FeedbackCollection};
use volucast_sender::color::RawColorEncoder;
use volucast_sender::encode::{packetize, VideoEncodePipeline, VideoFrameSet};
use volucast_sender::video::VideoPacketSender;
use volucast_protocol::receiver::ConnectReceiverPacket;

const SESSION: u32 = 0xC0FFEE;
const ABANDON: Duration = Duration::from_secs(1);
const HOLDOFF: Duration = Duration::from_millis(30);
const WIDTH: usize = 64;
const HEIGHT: usize = 48;

fn make_stream(frames: usize, keyframe_interval: u32) -> Vec<VideoFrameSet> {
    let mut source = SyntheticSource::new(WIDTH, HEIGHT);
    let mut pipeline = VideoEncodePipeline::new(
        &source.calibration(),
        Box::new(RawColorEncoder),
        keyframe_interval,
        SessionClock::start(),
    );

    (0..frames)
        .map(|_| {
            let mut frame = source.next_frame();
            let message = pipeline.encode(&mut frame).unwrap();
            packetize(SESSION, &message).unwrap()
        })
        .collect()
}

fn feed(assembler: &mut VideoMessageAssembler, set: &VideoFrameSet, now: Instant, drop_video: impl Fn(u16) -> bool) {
    for packet in &set.video_packets {
        if !drop_video(packet.packet_index) {
            assembler.add_video(packet.clone(), now);
        }
    }
    for packet in &set.parity_packets {
        assembler.add_parity(packet.clone(), now);
    }
}

fn assert_monotonic(ids: &[FrameId]) {
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1], "delivery went backwards: {pair:?}");
    }
}

#[test]
fn zero_loss_delivers_every_frame_in_order() {
    let t0 = Instant::now();
    let mut assembler = VideoMessageAssembler::new(ABANDON, HOLDOFF);
    let mut decoder = VideoDecodePipeline::new(WIDTH, HEIGHT, Box::new(RawColorDecoder));
    let stream = make_stream(60, 30);

    let mut delivered = Vec::new();
    for (i, set) in stream.iter().enumerate() {
        let now = t0 + Duration::from_millis(33 * i as u64);
        feed(&mut assembler, set, now, |_| false);
        delivered.extend(assembler.tick(now).delivered);
    }

    assert_eq!(delivered.len(), 60);
    let ids: Vec<FrameId> = delivered.iter().map(|m| m.frame_id).collect();
    assert_monotonic(&ids);
    assert_eq!(ids.first(), Some(&0));
    assert_eq!(ids.last(), Some(&59));

    // Every delivered frame decodes; one report per delivery.
    let mut report_count = 0;
    for message in &delivered {
        let frame = decoder.decode(message).unwrap();
        assert_eq!(frame.depth.len(), WIDTH * HEIGHT);
        report_count += 1;
    }
    assert_eq!(report_count, 60);
}

#[test]
fn sparse_single_losses_recovered_by_parity_alone() {
    let t0 = Instant::now();
    let mut assembler = VideoMessageAssembler::new(ABANDON, HOLDOFF);
    let stream = make_stream(60, 30);

    // Drop every tenth video packet. Packets per frame stay below ten,
    // so no frame loses two, and no parity group loses two.
    let mut counter = 0u64;
    let mut delivered = Vec::new();
    for (i, set) in stream.iter().enumerate() {
        let now = t0 + Duration::from_millis(33 * i as u64);
        for packet in &set.video_packets {
            counter += 1;
            if counter % 10 != 0 {
                assembler.add_video(packet.clone(), now);
            }
        }
        for packet in &set.parity_packets {
            assembler.add_parity(packet.clone(), now);
        }
        let output = assembler.tick(now);
        assert!(output.requests.is_empty(), "parity must cover single losses");
        assert!(!output.keyframe_wanted, "no frame may be abandoned");
        delivered.extend(output.delivered);
    }

    assert_eq!(delivered.len(), 60);
    assert_monotonic(&delivered.iter().map(|m| m.frame_id).collect::<Vec<_>>());
}

#[test]
fn double_loss_recovered_through_retransmission() {
    let t0 = Instant::now();
    let receiver_endpoint: SocketAddr = "127.0.0.1:9001".parse().unwrap();
    let mut assembler = VideoMessageAssembler::new(ABANDON, HOLDOFF);
    let mut sender = VideoPacketSender::new(SESSION);
    sender.apply_feedback(
        FeedbackCollection {
            connects: vec![ConnectInfo {
                endpoint: receiver_endpoint,
                packet: ConnectReceiverPacket {
                    receiver_id: 1,
                    wants_video: true,
                    wants_audio: false,
                },
            }],
            ..Default::default()
        },
        t0,
    );

    let stream = make_stream(10, 30);
    let mut delivered = Vec::new();
    for (i, set) in stream.iter().enumerate() {
        let now = t0 + Duration::from_millis(33 * i as u64);
        sender.record_sent(set.clone(), now);
        // Frame 4 loses two fragments of the same parity group.
        let dead_frame = set.frame_id == 4;
        feed(&mut assembler, set, now, |index| {
            dead_frame && (index == 0 || index == 1)
        });
        delivered.extend(assembler.tick(now).delivered);
    }

    // Past the holdoff the receiver asks for what is still missing.
    let now = t0 + Duration::from_millis(400);
    let output = assembler.tick(now);
    assert!(delivered.iter().all(|m| m.frame_id < 4));
    assert_eq!(output.requests.len(), 1);
    let (frame_id, packet_indices) = output.requests[0].clone();
    assert_eq!(frame_id, 4);
    assert_eq!(packet_indices, vec![0, 1]);

    // The request crosses to the sender, which resends from its store.
    let resends = sender.apply_feedback(
        FeedbackCollection {
            requests: vec![RequestReceiverPacket {
                receiver_id: 1,
                frame_id,
                packet_indices,
            }],
            ..Default::default()
        },
        now,
    );
    assert_eq!(resends.len(), 2);
    for (endpoint, bytes) in resends {
        assert_eq!(endpoint, receiver_endpoint);
        assert!(bytes.len() <= MAX_PACKET_SIZE);
        let packet = VideoSenderPacket::from_bytes(&bytes).unwrap();
        assembler.add_video(packet, now);
    }

    delivered.extend(assembler.tick(now).delivered);
    let ids: Vec<FrameId> = delivered.iter().map(|m| m.frame_id).collect();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
}

#[test]
fn burst_loss_resumes_at_next_keyframe() {
    let t0 = Instant::now();
    let mut assembler = VideoMessageAssembler::new(ABANDON, HOLDOFF);
    let stream = make_stream(30, 10);

    // Frames 10..=12 vanish entirely, keyframe 10 included. Delivery
    // must resume at keyframe 20 and stay monotonic.
    let mut delivered = Vec::new();
    for (i, set) in stream.iter().enumerate() {
        let now = t0 + Duration::from_millis(33 * i as u64);
        if (10..=12).contains(&set.frame_id) {
            continue;
        }
        feed(&mut assembler, set, now, |_| false);
        delivered.extend(assembler.tick(now).delivered);
    }

    // Let the catch-up window settle.
    let now = t0 + Duration::from_millis(33 * 30 + 2_000);
    delivered.extend(assembler.tick(now).delivered);

    let ids: Vec<FrameId> = delivered.iter().map(|m| m.frame_id).collect();
    assert_monotonic(&ids);
    assert!(ids.contains(&9), "everything before the burst arrives");
    assert!(!ids.contains(&10) && !ids.contains(&13), "the gap is dropped");
    assert!(ids.contains(&20), "delivery resumes at the next keyframe");
    assert_eq!(ids.last(), Some(&29));
}

#[test]
fn every_sender_packet_fits_in_one_datagram() {
    for set in make_stream(5, 2) {
        for packet in &set.video_packets {
            assert!(packet.to_bytes().len() <= MAX_PACKET_SIZE);
        }
        for packet in &set.parity_packets {
            assert!(packet.to_bytes().len() <= MAX_PACKET_SIZE);
        }
    }
}

#[test]
fn decoded_keyframe_matches_encoder_input_after_shadow_filter() {
    // The keyframe path is lossless end to end: what the decoder
    // reconstructs is exactly what the depth encoder was given.
    let t0 = Instant::now();
    let mut assembler = VideoMessageAssembler::new(ABANDON, HOLDOFF);
    let mut decoder = VideoDecodePipeline::new(WIDTH, HEIGHT, Box::new(RawColorDecoder));

    let stream = make_stream(3, 30);
    for (i, set) in stream.iter().enumerate() {
        feed(&mut assembler, set, t0 + Duration::from_millis(i as u64), |_| false);
    }
    let delivered = assembler.tick(t0 + Duration::from_millis(10)).delivered;
    assert_eq!(delivered.len(), 3);
    assert!(delivered[0].keyframe);
    assert!(!delivered[1].keyframe);

    // Reproduce the capture side: same synthetic frame, same shadow
    // filter. The keyframe decode must match it bit for bit.
    let mut reference = SyntheticSource::new(WIDTH, HEIGHT);
    let mut expected = reference.next_frame().depth;
    let mut shadow = volucast_depth::ShadowRemover::new(&reference.calibration());
    shadow.remove(&mut expected);

    let keyframe = decoder.decode(&delivered[0]).unwrap();
    assert_eq!(keyframe.depth, expected);
    assert_eq!(keyframe.color.len(), WIDTH * HEIGHT * 3);

    for message in &delivered[1..] {
        let frame = decoder.decode(message).unwrap();
        assert_eq!(frame.frame_id, message.frame_id);
        assert_eq!(frame.depth.len(), WIDTH * HEIGHT);
        assert!(frame.depth.iter().any(|&z| z > 0));
    }
}
