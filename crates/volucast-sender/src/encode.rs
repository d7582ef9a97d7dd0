use anyhow::Result;
use tracing::warn;

use volucast_depth::{Calibration, DepthCodecError, ShadowRemover, TrvlEncoder};
use volucast_net::SessionClock;
use volucast_protocol::error::ProtocolError;
use volucast_protocol::fec::make_parity_packets;
use volucast_protocol::frame::FrameMessage;
use volucast_protocol::sender::{fragment_frame, ParitySenderPacket, VideoSenderPacket};
use volucast_protocol::types::{FrameId, SessionId, XOR_MAX_GROUP_SIZE};

use crate::capture::SensorFrame;
use crate::color::ColorEncoder;

/// Per-frame encoding stage: shadow removal, depth and color encoding,
/// frame message assembly, keyframe scheduling.
pub struct VideoEncodePipeline {
    clock: SessionClock,
    shadow_remover: ShadowRemover,
    depth_encoder: TrvlEncoder,
    color_encoder: Box<dyn ColorEncoder>,
    keyframe_interval: u32,
    frame_id: FrameId,
    force_keyframe: bool,
}

impl VideoEncodePipeline {
    pub fn new(
        calibration: &Calibration,
        color_encoder: Box<dyn ColorEncoder>,
        keyframe_interval: u32,
        clock: SessionClock,
    ) -> Self {
        Self {
            clock,
            shadow_remover: ShadowRemover::new(calibration),
            depth_encoder: TrvlEncoder::new(calibration.width * calibration.height),
            color_encoder,
            keyframe_interval: keyframe_interval.max(1),
            frame_id: 0,
            force_keyframe: true,
        }
    }

    /// Make the next frame a keyframe (new receiver, reset, lost frame).
    pub fn request_keyframe(&mut self) {
        self.force_keyframe = true;
    }

    /// Turn one captured frame into a frame message.
    ///
    /// Depth pixels are shadow-filtered in place first. If delta
    /// compression grows past the raw size the frame is promoted to a
    /// keyframe and encoded again.
    pub fn encode(&mut self, frame: &mut SensorFrame) -> Result<FrameMessage> {
        let mut keyframe = self.force_keyframe || self.frame_id % self.keyframe_interval == 0;

        self.shadow_remover.remove(&mut frame.depth);

        let depth_bytes = match self.depth_encoder.encode(&frame.depth, keyframe) {
            Ok(bytes) => bytes,
            Err(DepthCodecError::CompressionGrewInput { .. }) if !keyframe => {
                warn!(
                    frame_id = self.frame_id,
                    "delta depth compression grew, promoting to keyframe"
                );
                keyframe = true;
                self.depth_encoder.encode(&frame.depth, true)?
            }
            Err(e) => return Err(e.into()),
        };

        let color_bytes = self.color_encoder.encode(&frame.color, keyframe)?;

        let message = FrameMessage::new(
            self.frame_id,
            self.clock.elapsed_ms(),
            keyframe,
            color_bytes.into(),
            depth_bytes.into(),
        );
        self.frame_id += 1;
        self.force_keyframe = false;
        Ok(message)
    }
}

/// A frame's worth of outbound packets, ready to transmit and to retain
/// for retransmission.
#[derive(Debug, Clone)]
pub struct VideoFrameSet {
    pub frame_id: FrameId,
    pub keyframe: bool,
    pub video_packets: Vec<VideoSenderPacket>,
    pub parity_packets: Vec<ParitySenderPacket>,
}

/// Fragment a frame message and derive its parity packets.
pub fn packetize(
    session_id: SessionId,
    message: &FrameMessage,
) -> Result<VideoFrameSet, ProtocolError> {
    let bytes = message.to_bytes();
    let video_packets = fragment_frame(session_id, message.frame_id, &bytes)?;
    let parity_packets =
        make_parity_packets(session_id, message.frame_id, XOR_MAX_GROUP_SIZE, &video_packets);
    Ok(VideoFrameSet {
        frame_id: message.frame_id,
        keyframe: message.keyframe,
        video_packets,
        parity_packets,
    })
}
