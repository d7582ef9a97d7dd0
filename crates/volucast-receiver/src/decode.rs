use anyhow::Result;
use bytes::Bytes;

use volucast_depth::TrvlDecoder;
use volucast_protocol::frame::FrameMessage;
use volucast_protocol::sender::AudioSenderPacket;
use volucast_protocol::types::FrameId;

use crate::color::ColorDecoder;

/// Work items for the decode task.
pub enum DecodeItem {
    Video(FrameMessage),
    Audio(AudioSenderPacket),
    /// Session changed: drop all codec state.
    Reset,
}

/// Timing of one delivered frame, fed back to the sender as a report.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryStats {
    pub frame_id: FrameId,
    pub decoder_time_ms: f32,
    pub frame_time_ms: f32,
}

/// Fully decoded frame handed to the renderer.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub frame_id: FrameId,
    pub timestamp_ms: f32,
    pub keyframe: bool,
    pub color: Bytes,
    pub depth: Vec<i16>,
}

/// Decode stage: color codec seam plus the depth decoder, whose state
/// follows the keyframe flags embedded in the frame messages.
pub struct VideoDecodePipeline {
    color_decoder: Box<dyn ColorDecoder>,
    depth_decoder: TrvlDecoder,
    num_pixels: usize,
}

impl VideoDecodePipeline {
    pub fn new(width: usize, height: usize, color_decoder: Box<dyn ColorDecoder>) -> Self {
        Self {
            color_decoder,
            depth_decoder: TrvlDecoder::new(width * height),
            num_pixels: width * height,
        }
    }

    pub fn decode(&mut self, message: &FrameMessage) -> Result<DecodedFrame> {
        let color = self.color_decoder.decode(&message.color_bytes)?;
        let depth = self
            .depth_decoder
            .decode(&message.depth_bytes, message.keyframe)?;
        Ok(DecodedFrame {
            frame_id: message.frame_id,
            timestamp_ms: message.frame_timestamp_ms,
            keyframe: message.keyframe,
            color,
            depth,
        })
    }

    /// Drop decoder state (session reset); the next frame must be a
    /// keyframe.
    pub fn reset(&mut self) {
        self.depth_decoder = TrvlDecoder::new(self.num_pixels);
    }
}
